use adpilot::config::{self, Config};
use adpilot::error::Error;
use tracing_subscriber::fmt::format::FmtSpan;

#[actix_web::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(config::load_log_level())
        .with_span_events(FmtSpan::NEW)
        .compact()
        .init();

    adpilot::run(Config::load()).await
}
