//! External tools formatguard drives

pub mod clang_format;
