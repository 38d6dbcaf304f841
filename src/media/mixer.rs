//! Сведение клипов на общую временную шкалу
//!
//! Каждый клип задерживается на своё смещение (на обоих каналах), затем все
//! клипы смешиваются фильтром amix с `duration=longest`: итоговая длина равна
//! концу самого позднего клипа.

use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error::{Result, TtsSyncError};
use crate::media::engine::{EngineJob, JobOutput, MediaEngine};
use crate::media::filter::{Filter, FilterGraph};

/// Кодек, которым кодируется сведённая дорожка
pub const MERGE_CODEC: &str = "libmp3lame";

/// Клип одного субтитра, привязанный к временной шкале
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedClip {
    /// Номер субтитра, из которого получен клип
    pub cue_id: u32,
    /// Путь к аудиофайлу клипа
    pub path: PathBuf,
    /// Смещение начала клипа на шкале (равно началу субтитра)
    pub start_offset_ms: u64,
    /// Измеренная длительность клипа
    pub duration_ms: f64,
}

impl SynthesizedClip {
    /// Момент окончания клипа на шкале
    pub fn end_ms(&self) -> f64 {
        self.start_offset_ms as f64 + self.duration_ms
    }
}

/// Ожидаемая длина сведённой дорожки: конец самого позднего клипа
pub fn timeline_span_ms(clips: &[SynthesizedClip]) -> f64 {
    clips.iter().map(SynthesizedClip::end_ms).fold(0.0, f64::max)
}

/// Граф фильтров для сведения клипов.
///
/// С `normalize` фильтр `amix` делит каждый вход на число звучащих в данный
/// момент клипов, так что одиночная реплика тише исходного клипа. Без него
/// входы складываются как есть; громкость всё равно выравнивает `loudnorm`.
pub fn build_merge_graph(clips: &[SynthesizedClip], normalize: bool) -> FilterGraph {
    let mut graph = FilterGraph::new();
    let mut mix_inputs = Vec::with_capacity(clips.len());

    for (index, clip) in clips.iter().enumerate() {
        let label = format!("a{}", index);
        let delay = clip.start_offset_ms;
        graph = graph.node(
            vec![format!("{}:a", index)],
            Filter::new("adelay").arg(format!("{}|{}", delay, delay)),
            vec![label.clone()],
        );
        mix_inputs.push(label);
    }

    let mut mix = Filter::new("amix")
        .option("inputs", clips.len())
        .option("duration", "longest");
    if !normalize {
        mix = mix.option("normalize", 0);
    }
    graph.node(mix_inputs, mix, vec![])
}

/// Свести клипы в один файл `output`
pub async fn merge_clips(
    engine: &dyn MediaEngine,
    clips: &[SynthesizedClip],
    output: &Path,
    normalize: bool,
) -> Result<()> {
    if clips.is_empty() {
        return Err(TtsSyncError::NothingToMerge);
    }

    info!("Mixing {} clips by timecode", clips.len());
    let job = EngineJob::complex(
        clips.iter().map(|clip| clip.path.clone()).collect(),
        build_merge_graph(clips, normalize),
        JobOutput::File {
            path: output.to_path_buf(),
            codec: Some(MERGE_CODEC.to_string()),
        },
    );

    match engine.run(&job).await {
        Ok(_) => {
            info!("Clips mixed into {}", output.display());
            Ok(())
        }
        Err(e) => {
            error!("Mixing failed: {}", e);
            Err(TtsSyncError::MergeEngine(e))
        }
    }
}
