use crate::dataset::Dataset;
use crate::error::NarrativeError;
use crate::monitor::KpiSummary;
use crate::narrative::backends::NarrativeBackend;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bridge between monitor output and a hosted language model
///
/// The assistant builds prompts from KPIs or the raw dataset, sends them
/// through the configured backend under a timeout and hands back the reply
/// text untouched apart from surrounding whitespace.
pub struct NarrativeAssistant {
    backend: Arc<dyn NarrativeBackend>,
    timeout: Duration,
}

impl NarrativeAssistant {
    /// Create an assistant with the default 60 second timeout
    pub fn new(backend: Arc<dyn NarrativeBackend>) -> Self {
        Self::with_timeout(backend, Duration::from_secs(60))
    }

    pub fn with_timeout(backend: Arc<dyn NarrativeBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Ask for a short safety summary of the aggregate statistics
    pub async fn summarize(&self, kpis: &KpiSummary) -> Result<String, NarrativeError> {
        let prompt = Self::format_summary_prompt(kpis);
        self.send(&prompt).await
    }

    /// Ask a free-text question about the full dataset
    ///
    /// # Errors
    ///
    /// Returns `NarrativeError::EmptyQuestion` for blank questions without
    /// contacting the backend.
    pub async fn answer(&self, dataset: &Dataset, question: &str) -> Result<String, NarrativeError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(NarrativeError::EmptyQuestion);
        }

        let prompt = Self::format_question_prompt(dataset, question)?;
        self.send(&prompt).await
    }

    /// Build the KPI summary prompt
    pub fn format_summary_prompt(kpis: &KpiSummary) -> String {
        format!(
            r#"Analyze the following real-time sensor data from a wearable IoT device:
- Avg Temp: {:.1} °C
- Avg Humidity: {:.1} %
- Avg AQI: {:.0}
- Avg Sound: {:.1} dB
- Avg Heart Rate: {:.0} bpm
- Avg SpO2: {:.1} %

Provide a short safety summary and list any health or environmental risks."#,
            kpis.avg_temperature_c,
            kpis.avg_humidity_percent,
            kpis.avg_aqi,
            kpis.avg_sound_db,
            kpis.avg_heart_rate_bpm,
            kpis.avg_spo2_percent,
        )
    }

    /// Build the dataset question prompt
    pub fn format_question_prompt(
        dataset: &Dataset,
        question: &str,
    ) -> Result<String, NarrativeError> {
        let data = serde_json::to_string(dataset.readings()).map_err(|e| {
            NarrativeError::PromptBuild(format!("Failed to serialize dataset: {}", e))
        })?;
        Ok(format!("Data: {}. Question: {}", data, question))
    }

    async fn send(&self, prompt: &str) -> Result<String, NarrativeError> {
        info!(
            "Requesting narrative from {} backend ({} byte prompt)",
            self.backend.name(),
            prompt.len()
        );
        let start_time = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.backend.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(NarrativeError::Timeout(self.timeout)),
        };

        let duration = start_time.elapsed();
        match result {
            Ok(text) => {
                debug!("Narrative received in {:?} ({} chars)", duration, text.len());
                Ok(text.trim().to_string())
            }
            Err(e) => {
                error!("Narrative request failed after {:?}: {}", duration, e);
                Err(e)
            }
        }
    }
}
