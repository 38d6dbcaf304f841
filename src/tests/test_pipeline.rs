//! Тесты оркестратора на подделках синтезатора и движка

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::fakes::{file_key, FailPoint, FakeEngine, FakeSynthesizer};
use crate::config::SyncConfig;
use crate::error::TtsSyncError;
use crate::pipeline::{Pipeline, SkipReason};
use crate::progress::{PipelineStage, ProgressUpdate};
use crate::subtitle::Cue;
use crate::text::{Dictionary, TextNormalizer};

fn config_in(dir: &Path, jobs: usize) -> SyncConfig {
    SyncConfig {
        scratch_dir: dir.join("temp_audio"),
        out_dir: dir.join("out"),
        max_concurrent_requests: jobs,
        ..SyncConfig::default()
    }
}

fn build(
    config: SyncConfig,
    synth: &Arc<FakeSynthesizer>,
    engine: &Arc<FakeEngine>,
    dictionary: Dictionary,
) -> Pipeline {
    Pipeline::new(
        config,
        synth.clone(),
        engine.clone(),
        TextNormalizer::new(dictionary),
    )
}

fn scenario_cues() -> Vec<Cue> {
    vec![
        Cue::new(1, 1000, 3000, "A"),
        Cue::new(2, 5000, 6000, "B"),
        Cue::new(3, 8000, 9000, ""),
    ]
}

fn scenario_engine() -> FakeEngine {
    FakeEngine::new()
        .with_duration("temp_0_1.mp3", 3.0)
        .with_duration("temp_1_2.mp3", 0.9)
        .with_mix_loudness(-27.61)
}

fn output_in(dir: &Path) -> PathBuf {
    dir.join("out").join("talk.mp3")
}

fn scratch_file(dir: &Path, name: &str) -> PathBuf {
    dir.join("temp_audio").join(name)
}

#[tokio::test]
async fn three_cue_run_produces_normalized_track() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(scenario_engine());
    let synth = Arc::new(FakeSynthesizer::new());
    let mut pipeline = build(config_in(dir.path(), 1), &synth, &engine, Dictionary::default());
    let output = output_in(dir.path());

    let report = pipeline.run(&scenario_cues(), &output).await.unwrap();
    assert_eq!(pipeline.stage(), PipelineStage::Done);

    let placed: Vec<(u32, u64)> = report
        .clips
        .iter()
        .map(|c| (c.cue_id, c.start_offset_ms))
        .collect();
    assert_eq!(placed, vec![(1, 1000), (2, 5000)]);
    assert_eq!(file_key(&report.clips[0].path), "processed_0_1.mp3");
    assert!((report.clips[0].duration_ms - 2000.0).abs() < 1e-6);
    assert_eq!(file_key(&report.clips[1].path), "temp_1_2.mp3");
    assert!((report.clips[1].duration_ms - 900.0).abs() < 1e-6);

    let tempo_jobs = engine.jobs_with("atempo");
    assert_eq!(tempo_jobs.len(), 1);
    assert!(tempo_jobs[0].to_args().contains(&"atempo=1.5".to_string()));
    assert_eq!(file_key(&tempo_jobs[0].inputs[0]), "temp_0_1.mp3");

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].cue_id, 3);
    assert!(matches!(report.skipped[0].reason, SkipReason::EmptyText));
    let called: Vec<u32> = synth.calls().iter().map(|(id, _)| *id).collect();
    assert_eq!(called, vec![1, 2]);

    assert!(report.merged_duration_ms.unwrap() >= 5900.0 - 1e-6);

    assert!((report.loudness.applied_offset - 11.61).abs() < 1e-9);
    // Движок пишет второй проход во временный файл, который затем переименовывается
    let final_lufs = engine.loudness_of(".talk.normalizing.mp3").unwrap();
    assert!((final_lufs - (-16.0)).abs() <= 0.5, "got {}", final_lufs);

    assert!(output.exists());
    assert!(!dir.path().join("out").join(".talk.normalizing.mp3").exists());
    for name in ["temp_0_1.mp3", "processed_0_1.mp3", "temp_1_2.mp3"] {
        assert!(scratch_file(dir.path(), name).exists(), "{} should be retained", name);
    }
    let leftover_merges = std::fs::read_dir(dir.path().join("temp_audio"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("temp_merged_"))
        .count();
    assert_eq!(leftover_merges, 0);
}

#[tokio::test]
async fn clip_order_follows_cues_despite_failures() {
    for jobs in [1, 4] {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(
            FakeEngine::new()
                .with_duration("temp_0_10.mp3", 0.5)
                .with_duration("temp_1_3.mp3", 0.5)
                .with_duration("temp_3_1.mp3", 0.5)
                .with_duration("temp_5_2.mp3", 0.5)
                .with_duration("temp_4_5.mp3", 0.5)
                .failing_probe("temp_4_5.mp3"),
        );
        let synth = Arc::new(FakeSynthesizer::new().failing_on("seven").staggered());
        let mut pipeline = build(config_in(dir.path(), jobs), &synth, &engine, Dictionary::default());

        let cues = vec![
            Cue::new(10, 0, 1000, "ten"),
            Cue::new(3, 1000, 2000, "three"),
            Cue::new(7, 2000, 3000, "seven"),
            Cue::new(1, 3000, 4000, "one"),
            Cue::new(5, 4000, 5000, "five"),
            Cue::new(2, 5000, 6000, "two"),
        ];
        let report = pipeline.run(&cues, &output_in(dir.path())).await.unwrap();

        let ids: Vec<u32> = report.clips.iter().map(|c| c.cue_id).collect();
        assert_eq!(ids, vec![10, 3, 1, 2], "jobs = {}", jobs);

        let skipped: Vec<u32> = report.skipped.iter().map(|s| s.cue_id).collect();
        assert_eq!(skipped, vec![7, 5], "jobs = {}", jobs);
        assert!(matches!(
            report.skipped[0].reason,
            SkipReason::Failed(TtsSyncError::Synthesis { cue_id: 7, .. })
        ));
        assert!(matches!(
            report.skipped[1].reason,
            SkipReason::Failed(TtsSyncError::DurationProbe { .. })
        ));

        let merge = engine.jobs_with("amix");
        assert_eq!(merge.len(), 1);
        let inputs: Vec<String> = merge[0].inputs.iter().map(|p| file_key(p)).collect();
        assert_eq!(
            inputs,
            vec!["temp_0_10.mp3", "temp_1_3.mp3", "temp_3_1.mp3", "temp_5_2.mp3"]
        );
    }
}

#[tokio::test]
async fn duplicate_cue_ids_keep_separate_clips() {
    for jobs in [1, 4] {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(
            FakeEngine::new()
                .with_duration("temp_0_1.mp3", 0.5)
                .with_duration("temp_1_2.mp3", 0.5)
                .with_duration("temp_2_2.mp3", 0.5),
        );
        let synth = Arc::new(FakeSynthesizer::new().echoing().staggered());
        let mut pipeline = build(config_in(dir.path(), jobs), &synth, &engine, Dictionary::default());

        let cues = vec![
            Cue::new(1, 0, 1000, "first"),
            Cue::new(2, 1000, 2000, "second"),
            Cue::new(2, 2000, 3000, "third"),
        ];
        let report = pipeline.run(&cues, &output_in(dir.path())).await.unwrap();

        assert_eq!(report.clips.len(), 3, "jobs = {}", jobs);
        let contents: Vec<String> = report
            .clips
            .iter()
            .map(|c| std::fs::read_to_string(&c.path).unwrap())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"], "jobs = {}", jobs);

        let merge = engine.jobs_with("amix");
        let inputs: Vec<String> = merge[0].inputs.iter().map(|p| file_key(p)).collect();
        assert_eq!(inputs, vec!["temp_0_1.mp3", "temp_1_2.mp3", "temp_2_2.mp3"]);
    }
}

#[tokio::test]
async fn tempo_only_for_overflowing_clips_with_positive_window() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(
        FakeEngine::new()
            .with_duration("temp_0_1.mp3", 1.2)
            .with_duration("temp_1_2.mp3", 1.2)
            .with_duration("temp_2_3.mp3", 0.8)
            .with_duration("temp_3_4.mp3", 1.0),
    );
    let synth = Arc::new(FakeSynthesizer::new());
    let mut pipeline = build(config_in(dir.path(), 1), &synth, &engine, Dictionary::default());

    let cues = vec![
        Cue::new(1, 2000, 2000, "zero window"),
        Cue::new(2, 5000, 4000, "negative window"),
        Cue::new(3, 6000, 7000, "fits"),
        Cue::new(4, 8000, 9000, "exactly fits"),
    ];
    let report = pipeline.run(&cues, &output_in(dir.path())).await.unwrap();

    assert!(engine.jobs_with("atempo").is_empty());
    assert_eq!(report.clips.len(), 4);
    assert!(report
        .clips
        .iter()
        .all(|c| file_key(&c.path).starts_with("temp_")));
    // Клипы без ускорения не перемеряются
    assert!(!engine.probed().iter().any(|p| p.starts_with("processed_")));
}

#[tokio::test]
async fn mix_scaling_can_be_turned_off() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(scenario_engine());
    let synth = Arc::new(FakeSynthesizer::new());
    let config = SyncConfig {
        normalize_mix: false,
        ..config_in(dir.path(), 1)
    };
    let mut pipeline = build(config, &synth, &engine, Dictionary::default());

    pipeline
        .run(&scenario_cues(), &output_in(dir.path()))
        .await
        .unwrap();

    let merge = engine.jobs_with("amix");
    assert_eq!(merge.len(), 1);
    assert!(merge[0]
        .to_args()
        .iter()
        .any(|arg| arg.ends_with("amix=inputs=2:duration=longest:normalize=0")));
}

#[tokio::test]
async fn tempo_failure_skips_only_that_cue() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(scenario_engine().failing_at(FailPoint::Tempo));
    let synth = Arc::new(FakeSynthesizer::new());
    let mut pipeline = build(config_in(dir.path(), 1), &synth, &engine, Dictionary::default());

    let report = pipeline
        .run(&scenario_cues(), &output_in(dir.path()))
        .await
        .unwrap();

    let ids: Vec<u32> = report.clips.iter().map(|c| c.cue_id).collect();
    assert_eq!(ids, vec![2]);
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::Failed(TtsSyncError::TempoAdjust(_))
    ));
    assert_eq!(pipeline.stage(), PipelineStage::Done);
}

#[tokio::test]
async fn nothing_to_merge_when_no_cue_produces_audio() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let synth = Arc::new(FakeSynthesizer::new());
    let mut pipeline = build(config_in(dir.path(), 1), &synth, &engine, Dictionary::default());
    let output = output_in(dir.path());

    let cues = vec![
        Cue::new(1, 0, 1000, "(・ω・)(・ω・)"),
        Cue::new(2, 1000, 2000, "   "),
    ];
    let err = pipeline.run(&cues, &output).await.unwrap_err();

    assert!(matches!(err, TtsSyncError::NothingToMerge));
    assert_eq!(pipeline.stage(), PipelineStage::Failed);
    assert!(synth.calls().is_empty());
    assert!(engine.jobs().is_empty());
    assert!(!output.exists());
}

#[tokio::test]
async fn nothing_to_merge_when_every_synthesis_fails() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let synth = Arc::new(FakeSynthesizer::new().failing_on("A").failing_on("B"));
    let mut pipeline = build(config_in(dir.path(), 2), &synth, &engine, Dictionary::default());

    let err = pipeline
        .run(&scenario_cues(), &output_in(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, TtsSyncError::NothingToMerge));
}

#[tokio::test]
async fn merge_failure_leaves_no_output_and_keeps_clips() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(scenario_engine().failing_at(FailPoint::Merge));
    let synth = Arc::new(FakeSynthesizer::new());
    let mut pipeline = build(config_in(dir.path(), 1), &synth, &engine, Dictionary::default());
    let output = output_in(dir.path());

    let err = pipeline.run(&scenario_cues(), &output).await.unwrap_err();

    assert!(matches!(err, TtsSyncError::MergeEngine(_)));
    assert_eq!(pipeline.stage(), PipelineStage::Failed);
    assert!(!output.exists());
    assert!(engine.jobs_with("loudnorm").is_empty());
    for name in ["temp_0_1.mp3", "processed_0_1.mp3", "temp_1_2.mp3"] {
        assert!(scratch_file(dir.path(), name).exists());
    }
}

#[tokio::test]
async fn application_failure_removes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(scenario_engine().failing_at(FailPoint::Application));
    let synth = Arc::new(FakeSynthesizer::new());
    let mut pipeline = build(config_in(dir.path(), 1), &synth, &engine, Dictionary::default());
    let output = output_in(dir.path());

    let err = pipeline.run(&scenario_cues(), &output).await.unwrap_err();

    assert!(matches!(err, TtsSyncError::ApplicationEngine(_)));
    assert_eq!(pipeline.stage(), PipelineStage::Failed);
    assert!(!output.exists());
    assert!(!dir.path().join("out").join(".talk.normalizing.mp3").exists());
    assert!(scratch_file(dir.path(), "temp_1_2.mp3").exists());
}

#[tokio::test]
async fn unparseable_analysis_stops_before_second_pass() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(scenario_engine().with_analysis_output("size=N/A time=00:00:06.00"));
    let synth = Arc::new(FakeSynthesizer::new());
    let mut pipeline = build(config_in(dir.path(), 1), &synth, &engine, Dictionary::default());
    let output = output_in(dir.path());

    let err = pipeline.run(&scenario_cues(), &output).await.unwrap_err();

    assert!(matches!(err, TtsSyncError::AnalysisParse(_)));
    assert_eq!(engine.jobs_with("loudnorm").len(), 1);
    assert!(!output.exists());
}

#[tokio::test]
async fn dictionary_with_invalid_pattern_still_applies_valid_rules() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new().with_duration("temp_0_1.mp3", 0.5));
    let synth = Arc::new(FakeSynthesizer::new());
    let dictionary = Dictionary::from_json(
        r#"{ "([": { "value": "never" }, "srt": { "value": "subtitles" } }"#,
    )
    .unwrap();
    assert_eq!(dictionary.len(), 1);
    let mut pipeline = build(config_in(dir.path(), 1), &synth, &engine, dictionary);

    let cues = vec![Cue::new(1, 0, 2000, "SRT line qwq")];
    pipeline.run(&cues, &output_in(dir.path())).await.unwrap();

    assert_eq!(synth.calls(), vec![(1, "subtitles line".to_string())]);
}

#[tokio::test]
async fn scratch_is_cleared_at_start() {
    let dir = tempfile::tempdir().unwrap();
    let stale = scratch_file(dir.path(), "temp_7_99.mp3");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, b"old run").unwrap();

    let engine = Arc::new(scenario_engine());
    let synth = Arc::new(FakeSynthesizer::new());
    let mut pipeline = build(config_in(dir.path(), 1), &synth, &engine, Dictionary::default());
    pipeline
        .run(&scenario_cues(), &output_in(dir.path()))
        .await
        .unwrap();

    assert!(!stale.exists());
}

#[tokio::test]
async fn progress_updates_follow_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(scenario_engine());
    let synth = Arc::new(FakeSynthesizer::new());
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    let mut pipeline =
        build(config_in(dir.path(), 1), &synth, &engine, Dictionary::default()).with_progress(tx);
    let output = output_in(dir.path());

    pipeline.run(&scenario_cues(), &output).await.unwrap();
    drop(pipeline);

    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }

    assert_eq!(updates.first(), Some(&ProgressUpdate::Started { total_cues: 3 }));
    assert_eq!(updates.last(), Some(&ProgressUpdate::Finished { output }));
    assert!(updates.iter().any(|u| matches!(
        u,
        ProgressUpdate::CueReady { cue_id: 1, speed_factor: Some(f), .. } if (*f - 1.5).abs() < 1e-9
    )));
    assert!(updates.iter().any(|u| matches!(
        u,
        ProgressUpdate::CueReady { cue_id: 2, speed_factor: None, .. }
    )));
    assert!(updates
        .iter()
        .any(|u| matches!(u, ProgressUpdate::CueSkipped { cue_id: 3, .. })));
    let passes: Vec<u8> = updates
        .iter()
        .filter_map(|u| match u {
            ProgressUpdate::Normalizing { pass } => Some(*pass),
            _ => None,
        })
        .collect();
    assert_eq!(passes, vec![1, 2]);
}
