//! Parallel batch conversion
//!
//! Jobs run on the rayon pool. Each job owns its emitter and diagnostics,
//! so workers share nothing mutable; the material set is read-only. A
//! failing job is reported and never stops its siblings.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use vsrc_common::{Diagnostics, Warning};

use crate::convert;
use crate::emit::FileEmitter;
use crate::manifest::{AssetKind, Job, Manifest, Settings};
use crate::material::MaterialSet;

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub name: String,
    pub kind: AssetKind,
    pub source: PathBuf,
    pub outputs: Vec<PathBuf>,
    pub warnings: Vec<Warning>,
    pub error: Option<String>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| !j.succeeded())
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn warning_count(&self) -> usize {
        self.jobs.iter().map(|j| j.warnings.len()).sum()
    }

    pub fn output_count(&self) -> usize {
        self.jobs.iter().map(|j| j.outputs.len()).sum()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write report {:?}", path))
    }
}

/// Convert one job. Errors are captured in the report.
pub fn run_job(job: &Job, settings: &Settings, materials: &MaterialSet, output_dir: &Path) -> JobReport {
    let mut emitter = FileEmitter::new(output_dir, settings.texture_format);
    let mut diag = Diagnostics::new();
    let started = Instant::now();

    let result = match job.kind {
        AssetKind::Level => convert::convert_level(
            &job.path,
            &job.name,
            &settings.geometry_options(),
            materials,
            &mut emitter,
            &mut diag,
        ),
        AssetKind::Texture => convert::convert_texture(&job.path, &job.name, &mut emitter),
        AssetKind::Material => {
            convert::convert_material(&job.path, &job.name, materials, &mut emitter, &mut diag)
        }
        AssetKind::Model => convert::convert_model(
            &job.path,
            &job.name,
            &settings.model_options(job.skin),
            materials,
            &mut emitter,
            &mut diag,
        ),
        AssetKind::Sound => convert::convert_sound(&job.path, &job.name, &mut emitter),
        AssetKind::Details | AssetKind::SoundScripts | AssetKind::Soundscapes => {
            convert::convert_script(&job.path, &job.name, Some(job.kind), &mut emitter, &mut diag)
        }
    };

    let error = match result {
        Ok(outputs) => {
            tracing::info!(
                "Converted {:?} '{}' -> {} files ({} warnings) in {:.2?}",
                job.kind,
                job.name,
                outputs.len(),
                diag.len(),
                started.elapsed()
            );
            None
        }
        Err(e) => {
            tracing::error!("Failed to convert {:?} '{}': {:#}", job.kind, job.name, e);
            Some(format!("{:#}", e))
        }
    };
    JobReport {
        name: job.name.clone(),
        kind: job.kind,
        source: job.path.clone(),
        outputs: emitter.into_written(),
        warnings: diag.into_warnings(),
        error,
    }
}

/// Run every job in parallel. Report order follows `jobs`.
pub fn run_jobs(
    jobs: &[Job],
    settings: &Settings,
    materials: &MaterialSet,
    output_dir: &Path,
) -> BatchReport {
    let jobs = jobs
        .par_iter()
        .map(|job| run_job(job, settings, materials, output_dir))
        .collect();
    BatchReport { jobs }
}

/// Build everything a manifest names and write `report.json`
pub fn build_all(manifest: &Manifest, output_override: Option<&Path>) -> Result<BatchReport> {
    let output_dir = output_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest.output_dir());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let jobs = manifest.jobs()?;
    let materials = manifest.settings.material_set(&manifest.base_dir);
    tracing::info!(
        "Converting {} assets on {} threads",
        jobs.len(),
        rayon::current_num_threads()
    );
    let report = run_jobs(&jobs, &manifest.settings, &materials, &output_dir);
    report.write(&output_dir.join("report.json"))?;
    tracing::info!(
        "Wrote {} files, {} warnings, {} failures",
        report.output_count(),
        report.warning_count(),
        report.failure_count()
    );
    Ok(report)
}
