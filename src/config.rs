// ABOUTME: Version and shell constants

pub const VERSION: &str = "0.8.0";
pub const WELCOME_MESSAGE: &str = "WAL - Waveform Analysis Language";
pub const PROMPT: &str = ">-> ";
pub const PROMPT_CONTINUE: &str = "..> ";
