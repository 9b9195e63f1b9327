//! Test-data placeholders in workflow files
//!
//! Supported forms:
//! - `${timestamp}` and `${timestamp:<strftime>}`
//! - `${random_ip}` as `a.b.c.d:port`
//! - `${random_words:N}`
//! - `${env:NAME}`
//!
//! All timestamps in one expansion share the same instant, so names built
//! from them stay consistent across steps.

use crate::errors::{Result, UiflowError};
use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use rand::Rng;
use std::env;

const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const WORDS: &[&str] = &[
    "test",
    "article",
    "content",
    "sample",
    "random",
    "example",
    "data",
    "text",
    "word",
    "sentence",
    "paragraph",
    "story",
    "news",
    "update",
    "information",
    "details",
    "description",
    "summary",
    "note",
];

pub struct Expander<R> {
    now: DateTime<Local>,
    rng: R,
}

impl Expander<rand::rngs::ThreadRng> {
    pub fn new() -> Self {
        Self::with_parts(Local::now(), rand::thread_rng())
    }
}

impl Default for Expander<rand::rngs::ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Expander<R> {
    pub fn with_parts(now: DateTime<Local>, rng: R) -> Self {
        Self { now, rng }
    }

    /// Replace every `${...}` in `input`; `$${` escapes a literal `${`.
    pub fn expand(&mut self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            if rest[..start].ends_with('$') {
                out.push_str(&rest[..start - 1]);
                out.push_str("${");
                rest = &rest[start + 2..];
                continue;
            }
            out.push_str(&rest[..start]);
            let body_start = start + 2;
            let Some(len) = rest[body_start..].find('}') else {
                return Err(UiflowError::placeholder(
                    &rest[start..],
                    "missing closing '}'",
                ));
            };
            let body = &rest[body_start..body_start + len];
            out.push_str(&self.resolve(body)?);
            rest = &rest[body_start + len + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn resolve(&mut self, body: &str) -> Result<String> {
        let (name, arg) = match body.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (body.trim(), None),
        };
        let token = || format!("${{{}}}", body);
        match (name, arg) {
            ("timestamp", None) => Ok(self.now.format(DEFAULT_TIMESTAMP_FORMAT).to_string()),
            ("timestamp", Some(format)) => {
                let mut rendered = String::new();
                use std::fmt::Write as _;
                write!(rendered, "{}", self.now.format(format))
                    .map_err(|_| UiflowError::placeholder(token(), "invalid strftime format"))?;
                Ok(rendered)
            }
            ("random_ip", None) => {
                let octets: Vec<String> = (0..4)
                    .map(|_| self.rng.gen_range(0..=255u8).to_string())
                    .collect();
                let port = self.rng.gen_range(1111..=9999u16);
                Ok(format!("{}:{}", octets.join("."), port))
            }
            ("random_words", Some(count)) => {
                let count: usize = count.trim().parse().map_err(|_| {
                    UiflowError::placeholder(token(), "word count must be a number")
                })?;
                let words: Vec<&str> = (0..count)
                    .filter_map(|_| WORDS.choose(&mut self.rng).copied())
                    .collect();
                Ok(words.join(" "))
            }
            ("env", Some(key)) => env::var(key.trim()).map_err(|_| {
                UiflowError::placeholder(token(), format!("environment variable {} is not set", key.trim()))
            }),
            _ => Err(UiflowError::placeholder(token(), "unknown placeholder")),
        }
    }
}
