//! End-to-end walk through the glyph learner.
//!
//! Draws synthetic glyphs through a capture session, trains on a background
//! thread while printing progress, recognizes a fresh drawing, then saves the
//! model to a slot and restores it.
//!
//! Run with: cargo run --example train_glyphs [config.toml]

use anyhow::Context;
use glyphnet_core::data::synthetic::{template_count, template_strokes};
use glyphnet_core::logging::init_tracing;
use glyphnet_core::{
    predict, CaptureSession, LearnerConfig, ModelHandle, ModelStore, Trainer,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut config = match std::env::args().nth(1) {
        Some(path) => LearnerConfig::load_from_file(&path)
            .with_context(|| format!("reading config from {path}"))?,
        None => LearnerConfig::default(),
    };
    // one symbol per synthetic template keeps the demo quick
    if config.num_classes() > template_count() {
        config.alphabet.symbols = "IHXOVL".to_string();
        config.training.epochs = config.training.epochs.min(150);
        config.training.learning_rate = 0.005;
    }

    println!("✏️  Glyph Learner");
    println!("================\n");
    println!("Configuration:");
    println!("  Sample size: {0}x{0}", config.model.sample_size);
    println!("  Alphabet: {}", config.alphabet.symbols);
    println!("  Epochs: {}", config.training.epochs);
    println!("  Learning rate: {}", config.training.learning_rate);
    println!();

    // Capture: draw whatever symbol the session prompts for
    let mut session = CaptureSession::from_config(&config)?;
    let canvas = config.canvas.width.min(config.canvas.height);
    let mut rng = StdRng::seed_from_u64(config.model.seed);
    let samples = 8 * session.alphabet().len();
    for _ in 0..samples {
        let strokes = template_strokes(session.target(), canvas, 0.04, &mut rng);
        for stroke in &strokes {
            session.surface_mut().draw_path(stroke);
        }
        session.capture()?;
    }
    println!("📊 Captured {} samples", session.dataset().len());
    println!("  Per class: {:?}\n", session.dataset().class_counts());

    // Train in the background and stream progress
    let handle = ModelHandle::from_config(&config.classifier_config())?;
    println!("{}", handle.with_model(|model| model.summary())?);

    let dataset = session.dataset().clone();
    let job = Trainer::from_settings(&config.training).spawn(&handle, dataset)?;
    for progress in job.progress.iter() {
        if progress.epoch % 25 == 0 {
            println!("  epoch {:>4}  loss {:.4}", progress.epoch, progress.loss);
        }
    }
    let summary = job.join()?;
    println!(
        "\n🎓 Trained {} epochs in {} ms, training accuracy {:.1}%\n",
        summary.epochs_run,
        summary.elapsed_ms,
        summary.final_accuracy * 100.0
    );

    // Recognize a fresh drawing of the next prompt
    let expected = session.target_symbol();
    for stroke in template_strokes(session.target(), canvas, 0.04, &mut rng) {
        session.surface_mut().draw_path(&stroke);
    }
    let prediction = session.recognize(&handle)?;
    match prediction.symbol(session.alphabet()) {
        Some(symbol) => println!(
            "🔍 Drew {:?}, recognized {:?} ({:.1}%)",
            expected,
            symbol,
            prediction.confidence() * 100.0
        ),
        None => println!("🔍 Drew {expected:?}, unrecognized"),
    }

    // Persist and restore
    let store = ModelStore::from_config(&config.storage);
    store.save(&handle, &config.storage.slot)?;
    let restored = ModelHandle::new(store.load(&config.storage.slot)?);
    let again = predict(&restored, &session.dataset().samples()[0])?;
    println!(
        "💾 Saved slot '{}' in {}, restored model predicts {:?} for the first sample",
        config.storage.slot,
        store.root().display(),
        again.symbol(session.alphabet())
    );

    Ok(())
}
