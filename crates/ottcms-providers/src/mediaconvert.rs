//! AWS MediaConvert client for MP4 renditions.

use aws_config::BehaviorVersion;
use aws_sdk_mediaconvert::config::{Builder, Region};
use aws_sdk_mediaconvert::types::{
    AacCodingMode, AacSettings, AudioCodec, AudioCodecSettings, AudioDefaultSelection, AudioDescription,
    AudioSelector, ContainerSettings, ContainerType, FileGroupSettings, H264RateControlMode, H264Settings, Input,
    JobSettings, JobStatus, Output, OutputGroup, OutputGroupSettings, OutputGroupType, VideoCodec,
    VideoCodecSettings, VideoDescription,
};
use aws_sdk_mediaconvert::Client;
use tracing::info;

use ottcms_models::TaskStatus;

use crate::error::{env_or, required_env, ProviderError, ProviderResult};
use crate::transcoder::JobState;

#[derive(Debug, Clone)]
pub struct MediaConvertConfig {
    pub region: String,
    /// IAM role MediaConvert assumes to read input and write output.
    pub role_arn: String,
    pub queue_arn: Option<String>,
    /// Account endpoint override.
    pub endpoint_url: Option<String>,
    pub max_bitrate: i32,
}

impl MediaConvertConfig {
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            region: std::env::var("MEDIACONVERT_REGION")
                .or_else(|_| std::env::var("AWS_REGION"))
                .unwrap_or_else(|_| "us-east-1".to_string()),
            role_arn: required_env("MEDIACONVERT_ROLE_ARN")?,
            queue_arn: std::env::var("MEDIACONVERT_QUEUE_ARN").ok().filter(|v| !v.is_empty()),
            endpoint_url: std::env::var("MEDIACONVERT_ENDPOINT").ok().filter(|v| !v.is_empty()),
            max_bitrate: env_or("MEDIACONVERT_MAX_BITRATE", "8000000")
                .parse()
                .map_err(|_| ProviderError::config_error("MEDIACONVERT_MAX_BITRATE must be an integer"))?,
        })
    }
}

/// Job settings for a single H.264/AAC MP4 written under `destination`.
pub fn mp4_job_settings(input_uri: &str, destination: &str, max_bitrate: i32) -> JobSettings {
    let input = Input::builder()
        .file_input(input_uri)
        .audio_selectors(
            "Audio Selector 1",
            AudioSelector::builder()
                .default_selection(AudioDefaultSelection::Default)
                .build(),
        )
        .build();

    let video = VideoDescription::builder()
        .codec_settings(
            VideoCodecSettings::builder()
                .codec(VideoCodec::H264)
                .h264_settings(
                    H264Settings::builder()
                        .rate_control_mode(H264RateControlMode::Qvbr)
                        .max_bitrate(max_bitrate)
                        .build(),
                )
                .build(),
        )
        .build();

    let audio = AudioDescription::builder()
        .codec_settings(
            AudioCodecSettings::builder()
                .codec(AudioCodec::Aac)
                .aac_settings(
                    AacSettings::builder()
                        .bitrate(128_000)
                        .coding_mode(AacCodingMode::CodingMode20)
                        .sample_rate(48_000)
                        .build(),
                )
                .build(),
        )
        .build();

    let output = Output::builder()
        .container_settings(ContainerSettings::builder().container(ContainerType::Mp4).build())
        .video_description(video)
        .audio_descriptions(audio)
        .build();

    let group = OutputGroup::builder()
        .name("File Group")
        .output_group_settings(
            OutputGroupSettings::builder()
                .r#type(OutputGroupType::FileGroupSettings)
                .file_group_settings(FileGroupSettings::builder().destination(destination).build())
                .build(),
        )
        .outputs(output)
        .build();

    JobSettings::builder().inputs(input).output_groups(group).build()
}

fn map_job_status(status: Option<&JobStatus>) -> TaskStatus {
    match status {
        Some(JobStatus::Complete) => TaskStatus::Completed,
        Some(JobStatus::Error) | Some(JobStatus::Canceled) => TaskStatus::Failed,
        Some(JobStatus::Progressing) => TaskStatus::Processing,
        _ => TaskStatus::Submitted,
    }
}

#[derive(Clone)]
pub struct MediaConvertClient {
    client: Client,
    config: MediaConvertConfig,
}

impl MediaConvertClient {
    pub async fn new(config: MediaConvertConfig) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        let mut builder = Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        Self {
            client: Client::from_conf(builder.build()),
            config,
        }
    }

    pub async fn from_env() -> ProviderResult<Self> {
        Ok(Self::new(MediaConvertConfig::from_env()?).await)
    }

    /// Submit an MP4 rendition job. Returns the MediaConvert job id.
    pub async fn submit_mp4(&self, input_uri: &str, destination: &str) -> ProviderResult<String> {
        let settings = mp4_job_settings(input_uri, destination, self.config.max_bitrate);
        let output = self
            .client
            .create_job()
            .role(&self.config.role_arn)
            .set_queue(self.config.queue_arn.clone())
            .settings(settings)
            .send()
            .await
            .map_err(|e| ProviderError::media_convert(aws_sdk_mediaconvert::error::DisplayErrorContext(e)))?;

        let job_id = output
            .job()
            .and_then(|j| j.id())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::invalid_response("mediaconvert", "create_job returned no job id"))?;
        info!(job_id = %job_id, destination, "Submitted MediaConvert MP4 job");
        Ok(job_id)
    }

    pub async fn status(&self, job_id: &str) -> ProviderResult<JobState> {
        let output = self
            .client
            .get_job()
            .id(job_id)
            .send()
            .await
            .map_err(|e| ProviderError::media_convert(aws_sdk_mediaconvert::error::DisplayErrorContext(e)))?;

        let job = output
            .job()
            .ok_or_else(|| ProviderError::invalid_response("mediaconvert", "get_job returned no job"))?;
        Ok(JobState {
            status: map_job_status(job.status()),
            error: job.error_message().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_write_under_destination() {
        let settings = mp4_job_settings("s3://raw/raw-media/m1/a.mp4", "s3://out/movies/m1/mp4/", 5_000_000);
        assert_eq!(settings.inputs().len(), 1);
        assert_eq!(settings.inputs()[0].file_input(), Some("s3://raw/raw-media/m1/a.mp4"));

        let destination = settings.output_groups()[0]
            .output_group_settings()
            .and_then(|s| s.file_group_settings())
            .and_then(|f| f.destination());
        assert_eq!(destination, Some("s3://out/movies/m1/mp4/"));
    }

    #[test]
    fn job_status_mapping() {
        assert_eq!(map_job_status(Some(&JobStatus::Complete)), TaskStatus::Completed);
        assert_eq!(map_job_status(Some(&JobStatus::Canceled)), TaskStatus::Failed);
        assert_eq!(map_job_status(Some(&JobStatus::Progressing)), TaskStatus::Processing);
        assert_eq!(map_job_status(None), TaskStatus::Submitted);
    }
}
