use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

pub fn init_logger() {
    let env = Env::default().filter_or("RUST_LOG", "warn,cosylaunch=info");

    let mut builder = Builder::from_env(env);

    builder
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("mio", LevelFilter::Error)
        .filter_module("rustls", LevelFilter::Warn)
        // Forwarded child process output lands on debug in the service modules
        .filter_module("cosylaunch::services::smoke", LevelFilter::Debug)
        .filter_module("cosylaunch::services::webui", LevelFilter::Debug)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}
