//! Measurement info: channel types, bad channels and projections of a session.

use crate::error::{CovError, Result};
use crate::proj::Projection;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Sensor type of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ChannelKind {
    /// MEG magnetometer
    #[display("mag")]
    Magnetometer,
    /// MEG planar gradiometer
    #[display("grad")]
    Gradiometer,
    /// EEG electrode
    #[display("eeg")]
    Eeg,
    /// Anything else (stimulus, EOG, ECG, misc)
    #[display("other")]
    Other,
}

impl ChannelKind {
    /// Whether this is an MEG sensor.
    pub const fn is_meg(self) -> bool {
        matches!(self, Self::Magnetometer | Self::Gradiometer)
    }
}

/// Which MEG sensors [`MeasurementInfo::pick_types`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MegSelection {
    /// No MEG channels
    None,
    /// Magnetometers and gradiometers
    All,
    /// Magnetometers only
    Magnetometers,
    /// Gradiometers only
    Gradiometers,
}

impl MegSelection {
    const fn accepts(self, kind: ChannelKind) -> bool {
        match self {
            Self::None => false,
            Self::All => kind.is_meg(),
            Self::Magnetometers => matches!(kind, ChannelKind::Magnetometer),
            Self::Gradiometers => matches!(kind, ChannelKind::Gradiometer),
        }
    }
}

/// A named channel and its sensor type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel name
    pub name: String,
    /// Sensor type
    pub kind: ChannelKind,
}

impl ChannelInfo {
    /// Create a channel description.
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Channel layout of a recording session.
#[derive(Debug, Clone, Default)]
pub struct MeasurementInfo {
    channels: Vec<ChannelInfo>,
    bads: Vec<String>,
    projs: Vec<Projection>,
    index: HashMap<String, usize>,
    bad_set: HashSet<String>,
}

impl MeasurementInfo {
    /// Create measurement info; channel names must be unique.
    pub fn new(channels: Vec<ChannelInfo>) -> Result<Self> {
        let mut index = HashMap::with_capacity(channels.len());
        for (i, ch) in channels.iter().enumerate() {
            if index.insert(ch.name.clone(), i).is_some() {
                return Err(CovError::DuplicateChannel(ch.name.clone()));
            }
        }
        Ok(Self {
            channels,
            bads: Vec::new(),
            projs: Vec::new(),
            index,
            bad_set: HashSet::new(),
        })
    }

    /// Mark channels as bad.
    pub fn with_bads(mut self, bads: Vec<String>) -> Self {
        self.bad_set = bads.iter().cloned().collect();
        self.bads = bads;
        self
    }

    /// Attach projection items.
    pub fn with_projs(mut self, projs: Vec<Projection>) -> Self {
        self.projs = projs;
        self
    }

    /// Channels in acquisition order.
    pub fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    /// Channel names in acquisition order.
    pub fn ch_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    /// Bad channels.
    pub fn bads(&self) -> &[String] {
        &self.bads
    }

    /// Projection items of the session.
    pub fn projs(&self) -> &[Projection] {
        &self.projs
    }

    /// Whether a channel with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether the channel is marked bad.
    pub fn is_bad(&self, name: &str) -> bool {
        self.bad_set.contains(name)
    }

    /// Sensor type of a channel, if it exists.
    pub fn channel_kind(&self, name: &str) -> Option<ChannelKind> {
        self.index.get(name).map(|&i| self.channels[i].kind)
    }

    /// Indices of channels matching the selection, in acquisition order.
    pub fn pick_types(&self, meg: MegSelection, eeg: bool, exclude_bads: bool) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| {
                meg.accepts(ch.kind) || (eeg && matches!(ch.kind, ChannelKind::Eeg))
            })
            .filter(|(_, ch)| !(exclude_bads && self.is_bad(&ch.name)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Names of the channels matching the selection, in acquisition order.
    pub fn pick_names(&self, meg: MegSelection, eeg: bool, exclude_bads: bool) -> Vec<String> {
        self.pick_types(meg, eeg, exclude_bads)
            .into_iter()
            .map(|i| self.channels[i].name.clone())
            .collect()
    }
}
