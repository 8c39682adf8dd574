pub mod gemini;

#[cfg(test)]
pub(crate) mod scripted;
