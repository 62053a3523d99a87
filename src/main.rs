use std::env;

use leave_ledger::Ledger;
use leave_ledger::csv::{read_operations, write_balances};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let path = args
        .next()
        .expect("usage: leave-ledger <operations.csv> [as-of-date]");

    // replay files carry fixed dates, so the evaluation date can be pinned
    let ledger = match args.next() {
        Some(as_of) => Ledger::with_today(as_of.parse().expect("as-of-date must be YYYY-MM-DD")),
        None => Ledger::new(),
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let (op_sender, op_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in read_operations(&path) {
            match result {
                Ok(op) => {
                    op_sender.send(op).await.unwrap();
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    ledger.run(ReceiverStream::new(op_receiver)).await;

    write_balances(&ledger.all_periods().await);
}
