//! Links to third-party converter sites, for deployments that cannot reach
//! the video host themselves.

use serde::Serialize;

use crate::{formats::OutputFormat, video_id::VideoId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConverterService {
    pub name: &'static str,
    pub url: String,
    pub instructions: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesResponse {
    pub success: bool,
    pub video_id: VideoId,
    pub format: OutputFormat,
    pub services: Vec<ConverterService>,
    pub message: &'static str,
}

pub fn services_for(video_id: &VideoId, format: OutputFormat) -> Vec<ConverterService> {
    let watch_url = video_id.watch_url();
    match format {
        OutputFormat::Mp3 => vec![
            ConverterService {
                name: "Y2Mate",
                url: format!("https://www.y2mate.com/youtube-mp3/{video_id}"),
                instructions: "Click \"Convert\" then \"Download\"",
            },
            ConverterService {
                name: "YTMP3",
                url: format!("https://ytmp3.cc/youtube-to-mp3/?url={watch_url}"),
                instructions: "Click \"Convert\" then \"Download\"",
            },
            ConverterService {
                name: "SaveFrom",
                url: format!("https://en.savefrom.net/391GA/#url={watch_url}"),
                instructions: "Select MP3 format and download",
            },
        ],
        OutputFormat::Mp4 => vec![
            ConverterService {
                name: "Y2Mate",
                url: format!("https://www.y2mate.com/youtube/{video_id}"),
                instructions: "Select quality and click \"Download\"",
            },
            ConverterService {
                name: "SaveFrom",
                url: format!("https://en.savefrom.net/391GA/#url={watch_url}"),
                instructions: "Select MP4 quality and download",
            },
            ConverterService {
                name: "SSYouTube",
                url: format!("https://ssyoutube.com/watch?v={video_id}"),
                instructions: "Select format and download",
            },
        ],
    }
}

pub fn services_response(video_id: &VideoId, format: OutputFormat) -> ServicesResponse {
    ServicesResponse {
        success: true,
        video_id: video_id.clone(),
        format,
        services: services_for(video_id, format),
        message: "Choose a converter service below",
    }
}
