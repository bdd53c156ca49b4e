use anyhow::Result;
use clap::Parser;
use feedback_sentiment::sentiment::RecordAnalyzer;
use feedback_sentiment::RecalcConfig;

#[derive(Parser)]
#[command(name = "score-text", version, about = "Score one feedback text offline")]
struct Cli {
    /// Feedback text. Omit to score a blank record.
    text: Option<String>,

    /// Star rating (1-5) used when the text is blank.
    #[arg(long)]
    rating: Option<i32>,

    /// Use the negation-aware scorer instead of plain keyword counts.
    #[arg(long)]
    enhanced: bool,

    /// Override SENTIMENT_THRESHOLD.
    #[arg(long)]
    threshold: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = RecalcConfig::from_env()?;
    let threshold = cli.threshold.unwrap_or(config.threshold);

    let analyzer = if cli.enhanced {
        RecordAnalyzer::enhanced(threshold, config.max_text_chars)
    } else {
        RecordAnalyzer::keywords(threshold, config.max_text_chars)
    };

    let result = analyzer.analyze_text(cli.text.as_deref(), cli.rating);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
