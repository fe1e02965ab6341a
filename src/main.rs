use anyhow::{Context, Result};
use clap::Parser;
use futures::executor::LocalPool;
use loader::{EntryValue, LoaderOptions, MemoryContainer, start_entry_load};
use mimalloc::MiMalloc;
use net::{FetchConfig, UreqFetch};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::time::Duration;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "entryway")]
#[command(about = "Stream an HTML entry into an in-memory container and report its entry script")]
struct Cli {
    /// URL or literal markup to load
    entry: String,
    /// Treat ENTRY as the path of a local HTML file
    #[arg(long)]
    file: bool,
    /// Tag name `<head>` is renamed to before insertion
    #[arg(long, default_value = loader::DEFAULT_PRIVATE_HEAD_TAG)]
    private_head_tag: String,
    /// Maximum number of outline lines to print
    #[arg(long, default_value_t = 200)]
    outline_cap: usize,
    /// Leave external scripts pending instead of reporting them as loaded
    #[arg(long)]
    no_auto_load: bool,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let entry = if cli.file {
        fs::read_to_string(&cli.entry).with_context(|| format!("reading {}", cli.entry))?
    } else {
        cli.entry.clone()
    };

    let fetch = UreqFetch::new(FetchConfig {
        timeout: Duration::from_secs(cli.timeout),
        ..FetchConfig::default()
    })?;
    let container = Rc::new(RefCell::new(
        MemoryContainer::new("entry-root").with_auto_load(!cli.no_auto_load),
    ));

    let mut pool = LocalPool::new();
    let options = LoaderOptions::new(pool.spawner())
        .with_fetch(fetch)
        .with_private_head_tag(cli.private_head_tag);
    let load = pool.run_until(start_entry_load(&entry, Rc::clone(&container), options))?;
    let flushed = pool.run_until(load.stream_flushed());
    pool.run_until_stalled();

    // Whatever made it into the container stays there, even on failure.
    for line in container.borrow().outline(cli.outline_cap) {
        println!("{line}");
    }
    flushed?;

    let outcome = load.entry_ready().peek();
    log::debug!(
        target: "entry.loader",
        "{}: {} nodes inserted, entry {}",
        entry.chars().take(60).collect::<String>(),
        container.borrow().len(),
        match &outcome {
            Some(Ok(_)) => "ready",
            Some(Err(_)) => "failed",
            None => "pending",
        }
    );
    match outcome {
        Some(Ok(EntryValue::Empty)) => println!("entry: no external script"),
        Some(Ok(EntryValue::Exports(value))) => println!("entry: {value}"),
        Some(Err(err)) => return Err(err.into()),
        None => {
            let pending = container.borrow().pending_scripts().len();
            println!("entry: pending ({pending} scripts awaiting load)");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["entryway", "https://app.example/"]).unwrap();
        assert_eq!(cli.private_head_tag, "entry-head");
        assert_eq!(cli.outline_cap, 200);
        assert!(!cli.file && !cli.no_auto_load);
    }

    #[test]
    fn flags() {
        let cli = Cli::try_parse_from([
            "entryway",
            "index.html",
            "--file",
            "--private-head-tag",
            "app-head",
            "--no-auto-load",
            "--outline-cap",
            "5",
        ])
        .unwrap();
        assert!(cli.file && cli.no_auto_load);
        assert_eq!(cli.private_head_tag, "app-head");
        assert_eq!(cli.outline_cap, 5);
    }
}
