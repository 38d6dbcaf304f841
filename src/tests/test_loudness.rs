//! Тесты двухпроходной нормализации громкости

use std::path::Path;

use tokio_test::{assert_err, assert_ok};

use super::fakes::{FailPoint, FakeEngine};
use crate::config::LoudnessTarget;
use crate::error::TtsSyncError;
use crate::media::engine::{AudioFilter, EngineJob, JobOutput};
use crate::media::loudness::{corrected_offset, LoudnessNormalizer};

fn applied_option(job: &EngineJob, key: &str) -> String {
    match &job.filter {
        AudioFilter::Simple(chain) => chain.filters()[0].get(key).unwrap().to_string(),
        AudioFilter::Complex(_) => panic!("loudnorm runs as a simple filter"),
    }
}

fn touch(path: &Path) {
    std::fs::write(path, b"fake audio").unwrap();
}

#[tokio::test]
async fn two_passes_with_manual_offset() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mix.mp3");
    let output = dir.path().join("final.mp3");
    touch(&input);
    let engine = FakeEngine::new()
        .with_duration("mix.mp3", 9.0)
        .with_loudness("mix.mp3", -27.61);

    let normalizer = LoudnessNormalizer::new(&engine, LoudnessTarget::default());
    let report = assert_ok!(normalizer.normalize(&input, &output).await);

    assert_eq!(report.stats.measured_integrated, -27.61);
    assert_eq!(report.stats.engine_suggested_offset, 0.58);
    assert_eq!(report.applied_offset, 11.61);

    let jobs = engine.jobs_with("loudnorm");
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].output, JobOutput::Discard);
    assert!(jobs[0]
        .to_args()
        .contains(&"loudnorm=I=-16:LRA=11:tp=-1.5:print_format=json".to_string()));
    assert!(jobs[1].to_args().contains(
        &"loudnorm=I=-16:LRA=11:tp=-1.5:measured_i=-27.61:measured_lra=18.06:measured_tp=-4.47:measured_thresh=-39.2:offset=11.61"
            .to_string()
    ));
    assert!(output.exists());
}

#[test]
fn offset_never_follows_engine_suggestion() {
    tokio_test::block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mix.mp3");
        let output = dir.path().join("final.mp3");
        touch(&input);

        for target in [-23.0, -16.0, -14.0] {
            for measured in [-35.5, -27.61, -16.0, -9.25] {
                for suggested in [0.58, -7.0, 3.3] {
                    let engine = FakeEngine::new()
                        .with_duration("mix.mp3", 4.0)
                        .with_loudness("mix.mp3", measured)
                        .with_suggested_offset(suggested);
                    let goal = LoudnessTarget {
                        integrated: target,
                        ..LoudnessTarget::default()
                    };

                    let normalizer = LoudnessNormalizer::new(&engine, goal);
                    let report = normalizer.normalize(&input, &output).await.unwrap();

                    let expected = corrected_offset(target, measured);
                    assert_eq!(report.applied_offset, expected);
                    let jobs = engine.jobs_with("loudnorm");
                    assert_eq!(applied_option(&jobs[1], "offset"), format!("{:.2}", expected));

                    let result = engine.loudness_of(".final.normalizing.mp3").unwrap();
                    assert!(
                        (result - target).abs() <= 0.5,
                        "target {} measured {} suggested {} -> {}",
                        target,
                        measured,
                        suggested,
                        result
                    );
                }
            }
        }
    });
}

#[tokio::test]
async fn analysis_engine_failure_skips_second_pass() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mix.mp3");
    touch(&input);
    let engine = FakeEngine::new().failing_at(FailPoint::Analysis);

    let normalizer = LoudnessNormalizer::new(&engine, LoudnessTarget::default());
    let err = assert_err!(normalizer.normalize(&input, &dir.path().join("final.mp3")).await);

    assert!(matches!(err, TtsSyncError::AnalysisEngine(_)));
    assert_eq!(engine.jobs_with("loudnorm").len(), 1);
}

#[tokio::test]
async fn failed_application_keeps_previous_output_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mix.mp3");
    let output = dir.path().join("final.mp3");
    touch(&input);
    std::fs::write(&output, b"previous run").unwrap();
    let engine = FakeEngine::new()
        .with_loudness("mix.mp3", -20.0)
        .failing_at(FailPoint::Application);

    let normalizer = LoudnessNormalizer::new(&engine, LoudnessTarget::default());
    let err = assert_err!(normalizer.normalize(&input, &output).await);

    assert!(matches!(err, TtsSyncError::ApplicationEngine(_)));
    assert_eq!(std::fs::read(&output).unwrap(), b"previous run");
    assert!(!dir.path().join(".final.normalizing.mp3").exists());
}
