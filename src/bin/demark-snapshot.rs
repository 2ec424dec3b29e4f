use anyhow::{bail, Context, Result};

use demark_monitor::clock::Granularity;
use demark_monitor::feed::rest::RestClient;
use demark_monitor::history::DEFAULT_HISTORY_LEN;
use demark_monitor::indicator::{
    self, candles_since_flip, classified_window, FlipKind, IndicatorSettings,
};
use demark_monitor::model::candle::Candle;
use demark_monitor::ui::dashboard::flip_label;

const DEFAULT_REST_URL: &str = "https://api.exchange.coinbase.com";

struct Args {
    product: String,
    granularity: Granularity,
    combined: bool,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut combined = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--combined" => combined = true,
            "-h" | "--help" => {
                println!("usage: demark-snapshot <PRODUCT> <GRANULARITY> [--combined]");
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown option '{}'", other),
            _ => positional.push(arg),
        }
    }
    if positional.len() != 2 {
        bail!("usage: demark-snapshot <PRODUCT> <GRANULARITY> [--combined]");
    }
    let granularity = positional[1]
        .parse()
        .with_context(|| format!("bad granularity '{}'", positional[1]))?;
    Ok(Args {
        product: positional[0].to_ascii_uppercase(),
        granularity,
        combined,
    })
}

fn print_table(title: &str, candles: &[Candle]) {
    println!();
    println!("{} ({} candles)", title, candles.len());
    println!(
        "{:<17} {:>11} {:>11} {:>11} {:>11} {:>12} {:>5} {:>4} {:>4}",
        "time", "open", "high", "low", "close", "volume", "flip", "buy", "sell"
    );
    for c in candles {
        let fmt = |v: Option<f64>| v.map_or_else(|| "---".to_string(), |p| format!("{:.2}", p));
        println!(
            "{:<17} {:>11} {:>11} {:>11} {:>11} {:>12.4} {:>5} {:>4} {:>4}",
            c.time.format("%Y-%m-%d %H:%M"),
            fmt(c.ohlc.map(|o| o.open)),
            fmt(c.ohlc.map(|o| o.high)),
            fmt(c.ohlc.map(|o| o.low)),
            fmt(c.close()),
            c.volume,
            flip_label(c),
            c.td_buy_count,
            c.td_sell_count,
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;
    dotenvy::dotenv().ok();

    let args = parse_args()?;
    let base_url =
        std::env::var("DEMARK_REST_URL").unwrap_or_else(|_| DEFAULT_REST_URL.to_string());
    let rest = RestClient::new(&base_url)?;

    let mut candles = rest
        .get_candles(&args.product, args.granularity)
        .await
        .with_context(|| format!("failed to fetch {} {} candles", args.product, args.granularity))?;
    candles.truncate(DEFAULT_HISTORY_LEN);
    let annotated = indicator::derive(&candles, &IndicatorSettings::default())?;

    println!("Product: {} ({})", args.product, args.granularity);
    if args.combined {
        print_table("Bullish and bearish flips", classified_window(&annotated));
    } else {
        print_table(
            "Since bearish flip",
            candles_since_flip(&annotated, FlipKind::Bearish),
        );
        print_table(
            "Since bullish flip",
            candles_since_flip(&annotated, FlipKind::Bullish),
        );
    }
    Ok(())
}
