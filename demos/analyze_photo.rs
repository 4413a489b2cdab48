use slingcheck::{AnalyzeOptions, Analyzer, AnalyzerConfig, SourceImage};

fn media_type(path: &str) -> &'static str {
    match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let image_path = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: analyze_photo <image_path> [model] [mode]");
        std::process::exit(1);
    });
    let model = std::env::args().nth(2).unwrap_or("claude".to_string());
    let mode = std::env::args().nth(3).unwrap_or("verified".to_string());

    let api_key = if model.starts_with("gpt") {
        std::env::var("OPENAI_API_KEY")?
    } else {
        std::env::var("ANTHROPIC_API_KEY")?
    };

    let analyzer = Analyzer::new(AnalyzerConfig::default())?;
    analyzer.store_api_key(&model, &api_key).await?;

    let photo = SourceImage::new(std::fs::read(&image_path)?, media_type(&image_path));
    println!("Analyzing {} with '{}' in '{}' mode...", image_path, model, mode);

    let options = AnalyzeOptions::default().with_mode(mode);
    let report = analyzer.analyze(&photo, &model, &options, |_, _| {}).await?;

    println!("{}", report);
    Ok(())
}
