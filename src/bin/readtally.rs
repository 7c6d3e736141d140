use anyhow::Result;
use structopt::StructOpt;

use readtally::cli::{run, Readtally};

pub fn main() -> Result<()> {
    let opt = Readtally::from_args();

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(if opt.verbose() {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .chain(std::io::stderr())
        .apply()?;

    run(opt)
}
