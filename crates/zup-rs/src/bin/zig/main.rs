use std::env;

use zup_lib::{Config, FAILURE_EXIT_CODE};

fn main() {
    let code = match runner() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("zig: error: {err}");
            FAILURE_EXIT_CODE
        }
    };
    std::process::exit(code);
}

fn runner() -> anyhow::Result<i32> {
    zup_lib::init_tracing();

    let args = env::args_os().skip(1).collect::<Vec<_>>();
    let config = Config::from_env()?;
    Ok(zup_lib::dispatch(&config, args)?)
}
