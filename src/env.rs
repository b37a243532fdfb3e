use std::{cell::RefCell, ffi::OsStr};

use log::LevelFilter;

/// Variable holding the log level, e.g. `MARIE_LOG=trace` to log every cycle.
pub const LOG_VAR: &str = "MARIE_LOG";

#[derive(Clone, Copy)]
struct Env {
    log_level: LevelFilter,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        log_level: parse_level(var(LOG_VAR).as_deref()),
    };
    set_env(value);
}

pub fn log_level() -> LevelFilter {
    with_env(|env| env.log_level)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

/// Unset or unparsable values turn logging off.
fn parse_level(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(LevelFilter::Off)
}

fn var(name: impl AsRef<OsStr>) -> Option<String> {
    std::env::var(name.as_ref()).ok()
}
