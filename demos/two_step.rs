use slingcheck::{Analyzer, AnalyzerConfig, ResolvedPrompts, SourceImage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let image_path = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: two_step <image.jpg>");
        std::process::exit(1);
    });

    let analyzer = Analyzer::new(AnalyzerConfig::default())?;
    analyzer
        .store_api_key("claude", &std::env::var("ANTHROPIC_API_KEY")?)
        .await?;

    let ResolvedPrompts::Staged(staged) = analyzer.prompts().lookup("twoStep")?.clone() else {
        return Err("twoStep mode is not staged".into());
    };

    let photo = SourceImage::new(std::fs::read(&image_path)?, "image/jpeg");
    let report = analyzer
        .analyze_two_step(&photo, "claude", &staged, |raw, parsed| {
            println!("--- Step 1 ---\n{}\n", raw);
            println!(
                "Position: {} | Age: {} | Legs: {}",
                parsed.position, parsed.age, parsed.legs
            );
        })
        .await?;

    println!("\n--- Step 2 ---\n{}", report.step2);
    Ok(())
}
