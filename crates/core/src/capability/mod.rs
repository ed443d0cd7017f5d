//! Analysis categories a plugin asks the host to compute.
//!
//! The declaration is advisory. The host uses it to skip features nobody
//! reads; it never changes which queries a plugin may issue. A declared
//! feature the host cannot supply degrades to zeroed or empty data.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Channel;

/// One audio feature category. Each variant owns a distinct bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioFeature {
    TimeDomainMono,
    TimeDomainStereo,
    FrequencyDomainMono,
    FrequencyDomainStereo,
    ChromagramMono,
    ChromagramStereo,
    PulseMono,
    PulseStereo,
    TempoMono,
    TempoStereo,
}

/// Kind of data independent of which channels it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    TimeDomain,
    FrequencyDomain,
    Chromagram,
    Pulse,
    Tempo,
}

impl AudioFeature {
    pub const ALL: [AudioFeature; 10] = [
        AudioFeature::TimeDomainMono,
        AudioFeature::TimeDomainStereo,
        AudioFeature::FrequencyDomainMono,
        AudioFeature::FrequencyDomainStereo,
        AudioFeature::ChromagramMono,
        AudioFeature::ChromagramStereo,
        AudioFeature::PulseMono,
        AudioFeature::PulseStereo,
        AudioFeature::TempoMono,
        AudioFeature::TempoStereo,
    ];

    /// Bit assigned to this feature inside a [`Capabilities`] mask.
    pub const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn kind(self) -> FeatureKind {
        match self {
            AudioFeature::TimeDomainMono | AudioFeature::TimeDomainStereo => {
                FeatureKind::TimeDomain
            }
            AudioFeature::FrequencyDomainMono | AudioFeature::FrequencyDomainStereo => {
                FeatureKind::FrequencyDomain
            }
            AudioFeature::ChromagramMono | AudioFeature::ChromagramStereo => {
                FeatureKind::Chromagram
            }
            AudioFeature::PulseMono | AudioFeature::PulseStereo => FeatureKind::Pulse,
            AudioFeature::TempoMono | AudioFeature::TempoStereo => FeatureKind::Tempo,
        }
    }

    pub fn is_stereo(self) -> bool {
        (self as u16) % 2 == 1
    }

    /// Feature that has to be declared for a query of `kind` on `channel`.
    pub fn for_query(kind: FeatureKind, channel: Channel) -> Self {
        let stereo = channel != Channel::Mono;
        match (kind, stereo) {
            (FeatureKind::TimeDomain, false) => AudioFeature::TimeDomainMono,
            (FeatureKind::TimeDomain, true) => AudioFeature::TimeDomainStereo,
            (FeatureKind::FrequencyDomain, false) => AudioFeature::FrequencyDomainMono,
            (FeatureKind::FrequencyDomain, true) => AudioFeature::FrequencyDomainStereo,
            (FeatureKind::Chromagram, false) => AudioFeature::ChromagramMono,
            (FeatureKind::Chromagram, true) => AudioFeature::ChromagramStereo,
            (FeatureKind::Pulse, false) => AudioFeature::PulseMono,
            (FeatureKind::Pulse, true) => AudioFeature::PulseStereo,
            (FeatureKind::Tempo, false) => AudioFeature::TempoMono,
            (FeatureKind::Tempo, true) => AudioFeature::TempoStereo,
        }
    }
}

/// Set of [`AudioFeature`]s, stored as a bit mask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<AudioFeature>", into = "Vec<AudioFeature>")]
pub struct Capabilities(u16);

impl Capabilities {
    const MASK: u16 = 0x03ff;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(Self::MASK)
    }

    /// Builds a mask from raw bits, dropping bits no feature owns.
    pub const fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn with(self, feature: AudioFeature) -> Self {
        Self(self.0 | feature.bit())
    }

    pub fn insert(&mut self, feature: AudioFeature) {
        self.0 |= feature.bit();
    }

    pub const fn contains(self, feature: AudioFeature) -> bool {
        self.0 & feature.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = AudioFeature> {
        AudioFeature::ALL
            .into_iter()
            .filter(move |feature| self.contains(*feature))
    }

    /// Whether any feature of `kind` is wanted for `channel`.
    pub fn wants(self, kind: FeatureKind, channel: Channel) -> bool {
        self.contains(AudioFeature::for_query(kind, channel))
    }

    /// Whether anything at all is wanted for `channel`.
    pub fn touches(self, channel: Channel) -> bool {
        self.iter()
            .any(|feature| feature.is_stereo() == (channel != Channel::Mono))
    }
}

impl FromIterator<AudioFeature> for Capabilities {
    fn from_iter<I: IntoIterator<Item = AudioFeature>>(iter: I) -> Self {
        let mut caps = Capabilities::empty();
        for feature in iter {
            caps.insert(feature);
        }
        caps
    }
}

impl From<Vec<AudioFeature>> for Capabilities {
    fn from(value: Vec<AudioFeature>) -> Self {
        value.into_iter().collect()
    }
}

impl From<Capabilities> for Vec<AudioFeature> {
    fn from(value: Capabilities) -> Self {
        value.iter().collect()
    }
}

impl From<AudioFeature> for Capabilities {
    fn from(value: AudioFeature) -> Self {
        Capabilities::empty().with(value)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_feature_has_its_own_bit() {
        let mut seen = 0u16;
        for feature in AudioFeature::ALL {
            assert_eq!(feature.bit().count_ones(), 1);
            assert_eq!(seen & feature.bit(), 0, "{feature:?} overlaps");
            seen |= feature.bit();
        }
        assert_eq!(seen, Capabilities::all().bits());
    }

    #[test]
    fn frequency_mono_and_time_stereo_are_independent() {
        let caps = Capabilities::from(AudioFeature::FrequencyDomainMono);
        assert!(!caps.contains(AudioFeature::TimeDomainStereo));
    }

    #[test]
    fn truncates_unknown_bits() {
        let caps = Capabilities::from_bits_truncate(u16::MAX);
        assert_eq!(caps, Capabilities::all());
        assert_eq!(caps.iter().count(), 10);
    }

    #[test]
    fn maps_queries_to_channel_flavour() {
        let caps = Capabilities::empty().with(AudioFeature::ChromagramStereo);
        assert!(caps.wants(FeatureKind::Chromagram, Channel::Left));
        assert!(caps.wants(FeatureKind::Chromagram, Channel::Right));
        assert!(!caps.wants(FeatureKind::Chromagram, Channel::Mono));
        assert!(caps.touches(Channel::Right));
        assert!(!caps.touches(Channel::Mono));
    }

    #[test]
    fn serializes_as_feature_list() {
        let caps = Capabilities::empty()
            .with(AudioFeature::TimeDomainMono)
            .with(AudioFeature::TempoStereo);
        let json = serde_json::to_string(&caps).unwrap();
        assert_eq!(json, r#"["TimeDomainMono","TempoStereo"]"#);
        let back: Capabilities = serde_json::from_str(&json).unwrap();
        assert_eq!(back, caps);
    }
}
