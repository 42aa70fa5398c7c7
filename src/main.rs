use pylon::config::Config;
use pylon::server::Reactor;

fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.max_level()?)
        .init();

    let mut reactor = Reactor::bind(&cfg)?;
    reactor.run()
}
