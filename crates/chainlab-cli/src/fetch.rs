use std::path::PathBuf;

use anyhow::Result;
use chainlab_headers::{
    fetch::{
        dedup_heights, fetch_into_cache, FetchConfig, Fetcher, DEFAULT_SAMPLE_COUNT,
        FALLBACK_HEIGHTS,
    },
    HeaderFile,
};
use clap::Args;
use tracing::warn;

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Block heights to fetch; a random sample is taken when omitted
    pub heights: Vec<u64>,
    /// Size of the random sample
    #[arg(long, default_value_t = DEFAULT_SAMPLE_COUNT)]
    pub count: usize,
    /// File to write; existing complete entries are reused by height
    #[arg(long, default_value = "blocks.json")]
    pub out: PathBuf,
}

fn preview(heights: &[u64]) -> String {
    let shown: Vec<String> = heights.iter().take(5).map(u64::to_string).collect();
    let more = if heights.len() > 5 { ", ..." } else { "" };
    format!("[{}{more}]", shown.join(", "))
}

pub async fn run(args: FetchArgs) -> Result<()> {
    let fetcher = Fetcher::new(FetchConfig::default())?;

    let heights = if args.heights.is_empty() {
        match fetcher.sample_heights(args.count, &mut rand::thread_rng()).await {
            Ok(heights) => {
                println!(
                    "Sampling {} random heights up to the tip: {}",
                    heights.len(),
                    preview(&heights)
                );
                heights
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "cannot sample heights, using fallback");
                println!("Could not sample heights; using {:?}.", FALLBACK_HEIGHTS);
                FALLBACK_HEIGHTS.to_vec()
            }
        }
    } else {
        let heights = dedup_heights(&args.heights);
        println!("Using {} heights from the command line: {}", heights.len(), preview(&heights));
        heights
    };

    let file = HeaderFile::new(&args.out);
    let summary = fetch_into_cache(&fetcher, &heights, &file).await?;
    println!(
        "Saved {} blocks to {} ({} cached, {} fetched, {} failed).",
        summary.saved(),
        file.path().display(),
        summary.cached,
        summary.fetched,
        summary.failed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::preview;

    #[test]
    fn preview_shows_the_first_five() {
        assert_eq!(preview(&[1, 2]), "[1, 2]");
        assert_eq!(preview(&[1, 2, 3, 4, 5, 6]), "[1, 2, 3, 4, 5, ...]");
    }
}
