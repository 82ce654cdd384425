use crate::infra::{
    parse_date, InMemoryChildDirectory, InMemoryScreeningRepository, InProcessCollaborators,
    Outages,
};
use chrono::{Local, Months, NaiveDate};
use child_screen::error::AppError;
use child_screen::workflows::screening::{
    CapturedImage, ChildDraft, ChildProfile, EmotionLogEntry, ModuleId, ModuleMetadata,
    ParentFeedback, ScreeningReport, ScreeningService, ScreeningSession, SubmissionCollaborators,
    ValueSource, MODULE_SEQUENCE,
};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Name of the child to register for the demo session.
    #[arg(long, default_value = "Asha")]
    pub(crate) name: String,
    /// Date of birth (YYYY-MM-DD). Defaults to 38 months before today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date_of_birth: Option<NaiveDate>,
    /// Comma-separated scores in module order (emotion, story, sound, sensor, voice, quiz).
    /// Leave an entry empty for a module that reports no score.
    #[arg(long, value_parser = parse_scores, default_value = "4,,5,3,2,4")]
    pub(crate) scores: ModuleScores,
    /// Emotion observed while the emotion module runs.
    #[arg(long, default_value = "happy")]
    pub(crate) observed_emotion: String,
    /// Nightly sleep reported on the parent feedback form.
    #[arg(long, default_value_t = 10.0)]
    pub(crate) sleep_hours: f32,
    /// Behavior notes reported on the parent feedback form.
    #[arg(long, default_value = "We play together and hug at bedtime")]
    pub(crate) behavior_notes: String,
    /// Simulate the screening store being unreachable.
    #[arg(long)]
    pub(crate) store_outage: bool,
    /// Simulate the bonding advisor being unreachable.
    #[arg(long)]
    pub(crate) bonding_outage: bool,
    /// Simulate the tip advisor being unreachable.
    #[arg(long)]
    pub(crate) tips_outage: bool,
}

/// Raw per-module scores in presentation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModuleScores([Option<i64>; 6]);

impl ModuleScores {
    fn for_module(&self, module: ModuleId) -> Option<i64> {
        MODULE_SEQUENCE
            .iter()
            .position(|candidate| *candidate == module)
            .and_then(|index| self.0[index])
    }
}

pub(crate) fn parse_scores(raw: &str) -> Result<ModuleScores, String> {
    let entries: Vec<&str> = raw.split(',').map(str::trim).collect();
    if entries.len() != MODULE_SEQUENCE.len() {
        return Err(format!(
            "expected {} comma-separated scores, got {}",
            MODULE_SEQUENCE.len(),
            entries.len()
        ));
    }

    let mut scores = [None; 6];
    for (slot, entry) in scores.iter_mut().zip(entries) {
        if entry.is_empty() {
            continue;
        }
        let value = entry
            .parse::<i64>()
            .map_err(|err| format!("'{entry}' is not a whole number ({err})"))?;
        *slot = Some(value);
    }
    Ok(ModuleScores(scores))
}

fn source_label(source: ValueSource) -> &'static str {
    match source {
        ValueSource::Collaborator => "live",
        ValueSource::Fallback => "fallback",
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        name,
        date_of_birth,
        scores,
        observed_emotion,
        sleep_hours,
        behavior_notes,
        store_outage,
        bonding_outage,
        tips_outage,
    } = args;

    let today = Local::now().date_naive();
    let date_of_birth = date_of_birth.or_else(|| today.checked_sub_months(Months::new(38)));

    let service = Arc::new(ScreeningService::new(
        Arc::new(InMemoryChildDirectory::default()),
        Arc::new(InMemoryScreeningRepository::default()),
    ));
    let outages = Outages {
        store: store_outage,
        bonding: bonding_outage,
        tips: tips_outage,
    };
    let in_process = Arc::new(InProcessCollaborators::new(service.clone(), outages));
    let collaborators =
        SubmissionCollaborators::new(in_process.clone(), in_process.clone(), in_process);

    println!("Child screening demo");
    let child = service.add_child(ChildDraft {
        name,
        date_of_birth,
        gender: "Unspecified".to_string(),
    })?;
    println!(
        "- Registered {} ({}) aged {}",
        child.name, child.id, child.age_readable
    );

    let mut session = ScreeningSession::new();
    session.select_child(ChildProfile::from(&child));
    if let Err(err) = session.start() {
        println!("  Session could not start: {}", err);
        return Ok(());
    }

    println!("\nModules");
    while let Some(module) = session.current_module() {
        let difficulty = session
            .current_difficulty()
            .map(|difficulty| difficulty.label())
            .unwrap_or("normal");
        let raw = scores.for_module(module);
        let metadata = if module == ModuleId::Emotion {
            ModuleMetadata {
                image: Some(CapturedImage("data:image/jpeg;base64,demo-frame".to_string())),
                emotion_log: Some(EmotionLogEntry {
                    emotion: observed_emotion.clone(),
                    confidence: Some(0.9),
                    captured_at: None,
                }),
            }
        } else {
            ModuleMetadata::default()
        };

        if let Err(err) = session.report_module(module, raw, metadata) {
            println!("  {} rejected: {}", module.label(), err);
            return Ok(());
        }
        let (completed, total) = session.progress();
        match raw {
            Some(score) => println!(
                "  [{completed}/{total}] {} ({difficulty}) -> {score}",
                module.label()
            ),
            None => println!(
                "  [{completed}/{total}] {} ({difficulty}) -> no score",
                module.label()
            ),
        }
    }

    let report = match session.submit(&collaborators).await {
        Ok(report) => report.clone(),
        Err(err) => {
            println!("  Submission refused: {}", err);
            return Ok(());
        }
    };
    render_report(&report);

    let feedback = ParentFeedback {
        sleep_hours: Some(sleep_hours),
        speech_level: "short sentences".to_string(),
        behavior_notes,
        concerns: String::new(),
    };
    match session.submit_feedback(&feedback, &collaborators).await {
        Ok(outcome) => {
            println!("\nParent feedback");
            println!(
                "- Bonding {:.1} ({}) [{}]",
                outcome.bonding.score,
                outcome.bonding.intervention,
                source_label(outcome.sources.bonding)
            );
            println!(
                "- Tip of the day: {} [{}]",
                outcome.tips.tip,
                source_label(outcome.sources.tips)
            );
            println!("- Feedback record [{}]", source_label(outcome.sources.record));
        }
        Err(err) => println!("\n  Feedback rejected: {}", err),
    }

    match service.analytics(&child.id) {
        Ok(analytics) => println!(
            "\nStored analytics: total {} -> {}",
            analytics.total_score, analytics.status
        ),
        Err(err) => println!("\nStored analytics unavailable: {}", err),
    }

    Ok(())
}

fn render_report(report: &ScreeningReport) {
    println!("\nScreening report");
    println!(
        "- Status: {} [{}]",
        report.status,
        source_label(report.sources.screening)
    );
    println!("- Recommendation: {}", report.recommendation);
    println!(
        "- Total {} (emotion {}, sound {}, quiz {})",
        report.total_score,
        report.scores.emotion_score,
        report.scores.sound_score,
        report.scores.quiz_score
    );
    println!(
        "- Bonding {:.1}: {} [{}]",
        report.bonding.score,
        report.bonding.intervention,
        source_label(report.sources.bonding)
    );
    println!("- Tips [{}]:", source_label(report.sources.tips));
    for tip in &report.tips.tips {
        println!("    - {}", tip);
    }
    if !report.emotion_logs.is_empty() {
        let observed: Vec<&str> = report
            .emotion_logs
            .iter()
            .map(|entry| entry.emotion.as_str())
            .collect();
        println!("- Observed emotions: {}", observed.join(", "));
    }
    match &report.heatmap {
        Some(_) => println!("- Heatmap attached"),
        None => println!("- Heatmap unavailable"),
    }
}
