use std::sync::mpsc;
use std::thread;

use glyphnet_core::data::synthetic::generate_glyph_dataset;
use glyphnet_core::{
    fit, predict, rasterize, spawn_fit, CaptureSession, ClassifierConfig, Dataset, DrawingSurface,
    LearnerConfig, LearnerError, ModelHandle, ModelStore, Point, StrokePath,
};

fn glyph_dataset() -> Dataset {
    // vertical vs horizontal bars
    generate_glyph_dataset(2, 4, 16, 80, 21).expect("synthetic dataset")
}

fn handle(num_classes: usize) -> ModelHandle {
    ModelHandle::from_config(&ClassifierConfig::new(16, num_classes).with_learning_rate(0.01))
        .expect("classifier")
}

#[test]
fn rasterize_always_yields_the_requested_side() {
    let stroke: StrokePath = [(0.1, 0.1), (0.9, 0.6)]
        .into_iter()
        .map(|(x, y)| Point::new(x, y))
        .collect();

    for (width, height) in [(1, 1), (7, 3), (28, 28), (100, 37), (280, 280), (641, 480)] {
        let mut surface = DrawingSurface::new(width, height, 4.0).expect("surface");
        let scaled: StrokePath = stroke
            .points()
            .iter()
            .map(|p| Point::new(p.x * width as f32, p.y * height as f32))
            .collect();
        surface.draw_path(&scaled);

        for side in [16, 28, 64] {
            let sample = rasterize(&surface, side);
            assert_eq!(sample.side(), side, "{width}x{height} -> {side}");
            assert!(sample.view().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }
}

#[test]
fn train_predict_save_load_round_trip() {
    let dataset = glyph_dataset();
    let handle = handle(2);

    assert!(matches!(
        predict(&handle, &dataset.samples()[0]),
        Err(LearnerError::UntrainedModel)
    ));

    let mut losses = Vec::new();
    let summary = fit(&handle, &dataset, 80, |p| losses.push(p.loss)).expect("fit");
    assert_eq!(losses.len(), 80);
    assert_eq!(summary.final_accuracy, 1.0);

    for (sample, label) in dataset.iter() {
        assert_eq!(predict(&handle, sample).expect("predict").label(), Some(label));
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let store = ModelStore::new(dir.path());
    store.save(&handle, "bars").expect("save");

    let restored = ModelHandle::new(store.load("bars").expect("load"));
    for sample in dataset.samples() {
        let before = predict(&handle, sample).expect("predict original");
        let after = predict(&restored, sample).expect("predict restored");
        assert_eq!(before.index, after.index);
        assert_eq!(before.probabilities, after.probabilities);
    }
}

#[test]
fn loaded_model_keeps_training() {
    let dataset = glyph_dataset();
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ModelStore::new(dir.path());

    let original = handle(2);
    fit(&original, &dataset, 5, |_| {}).expect("fit");
    store.save(&original, "model").expect("save");

    let resumed = handle(2);
    store.load_into(&resumed, "model").expect("load_into");
    let summary = fit(&resumed, &dataset, 5, |_| {}).expect("fit after load");
    assert_eq!(summary.epochs_run, 5);
}

#[test]
fn operations_are_refused_while_a_fit_is_running() {
    let dataset = glyph_dataset();
    let handle = handle(2);
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ModelStore::new(dir.path());

    let (started_tx, started_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();

    let worker = {
        let handle = handle.clone();
        let dataset = dataset.clone();
        thread::spawn(move || {
            fit(&handle, &dataset, 3, |progress| {
                if progress.epoch == 0 {
                    started_tx.send(()).expect("signal");
                    resume_rx.recv().expect("resume");
                }
            })
        })
    };

    started_rx.recv().expect("fit started");
    assert!(handle.is_training());
    assert!(matches!(
        fit(&handle, &dataset, 1, |_| {}),
        Err(LearnerError::TrainingInProgress)
    ));
    assert!(matches!(
        spawn_fit(&handle, dataset.clone(), 1),
        Err(LearnerError::TrainingInProgress)
    ));
    assert!(matches!(
        predict(&handle, &dataset.samples()[0]),
        Err(LearnerError::TrainingInProgress)
    ));
    assert!(matches!(
        store.save(&handle, "model"),
        Err(LearnerError::TrainingInProgress)
    ));
    assert!(matches!(
        store.load_into(&handle, "model"),
        Err(LearnerError::TrainingInProgress)
    ));

    resume_tx.send(()).expect("resume");
    let summary = worker.join().expect("worker").expect("fit");
    assert_eq!(summary.epochs_run, 3);
    assert!(!handle.is_training());
    assert!(predict(&handle, &dataset.samples()[0]).is_ok());
}

#[test]
fn capture_session_feeds_training_directly() {
    let config = LearnerConfig::from_str(
        r#"
        [model]
        sample_size = 16

        [canvas]
        width = 80
        height = 80
        stroke_width = 8.0

        [alphabet]
        symbols = "IH"
        "#,
    )
    .expect("config");
    let mut session = CaptureSession::from_config(&config).expect("session");

    for _ in 0..6 {
        match session.target() {
            0 => {
                session.pointer_down(40.0, 10.0);
                session.pointer_move(40.0, 70.0);
            }
            _ => {
                session.pointer_down(10.0, 40.0);
                session.pointer_move(70.0, 40.0);
            }
        }
        session.pointer_up();
        session.capture().expect("capture");
    }
    assert_eq!(session.dataset().len(), 6);

    let handle = ModelHandle::from_config(&config.classifier_config()).expect("classifier");
    let empty = Dataset::new(16, 2);
    assert!(matches!(
        fit(&handle, &empty, 1, |_| {}),
        Err(LearnerError::EmptyDataset)
    ));
    fit(&handle, session.dataset(), 2, |_| {}).expect("fit");

    session.pointer_down(40.0, 10.0);
    session.pointer_move(40.0, 70.0);
    session.pointer_up();
    let prediction = session.recognize(&handle).expect("recognize");
    assert_eq!(prediction.probabilities.len(), 2);
    assert!(session.surface().is_blank());
}
