//! Payload shapes for the Plex sections API.

use serde::Deserialize;

/// Top-level envelope returned by `GET /library/sections`.
#[derive(Debug, Default, Deserialize)]
pub struct SectionsResponse {
    #[serde(rename = "MediaContainer", default)]
    pub container: SectionsContainer,
}

#[derive(Debug, Default, Deserialize)]
pub struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    pub sections: Vec<Section>,
}

/// One library section with the filesystem locations it indexes.
#[derive(Clone, Debug, Deserialize)]
pub struct Section {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "Location", default)]
    pub locations: Vec<SectionLocation>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SectionLocation {
    pub path: String,
}
