//! General MIDI drum map: default lane layout, lane labels and the
//! level <-> velocity mapping shared by playback, recording and exchange.

/// Highest accent level a cell can carry.
pub const MAX_LEVEL: u8 = 3;
/// Lowest level of a cell that is on.
pub const MIN_ON_LEVEL: u8 = 1;

/// Default lanes in display order (top to bottom).
pub const DEFAULT_DRUM_LANES: [(&str, u8); 8] = [
    ("RIM", 37),
    ("HTOM", 48),
    ("MTOM", 45),
    ("LTOM", 41),
    ("OHH", 46),
    ("CHH", 42),
    ("SNARE", 38),
    ("KICK", 36),
];

/// Lanes that keep their note binding no matter what gets recorded.
pub const CORE_NOTES: [u8; 4] = [36, 38, 42, 46];

const GM_DRUM_LABELS: [(u8, &str); 47] = [
    (35, "ABD"),
    (36, "KICK"),
    (37, "RIM"),
    (38, "SNARE"),
    (39, "CLAP"),
    (40, "ESNR"),
    (41, "LTOM"),
    (42, "CHH"),
    (43, "HFTOM"),
    (44, "PHH"),
    (45, "MTOM"),
    (46, "OHH"),
    (47, "LMTOM"),
    (48, "HTOM"),
    (49, "CRSH1"),
    (50, "HITOM"),
    (51, "RIDE1"),
    (52, "CHINA"),
    (53, "BELL"),
    (54, "TAMB"),
    (55, "SPLSH"),
    (56, "COWB"),
    (57, "CRSH2"),
    (58, "VIBRA"),
    (59, "RIDE2"),
    (60, "HBONG"),
    (61, "LBONG"),
    (62, "MCONG"),
    (63, "OCONG"),
    (64, "LCONG"),
    (65, "HTIMB"),
    (66, "LTIMB"),
    (67, "HAGOG"),
    (68, "LAGOG"),
    (69, "CABAS"),
    (70, "MARAC"),
    (71, "SWHIS"),
    (72, "LWHIS"),
    (73, "SGUIR"),
    (74, "LGUIR"),
    (75, "CLAVE"),
    (76, "HWOOD"),
    (77, "LWOOD"),
    (78, "MCUIC"),
    (79, "OCUIC"),
    (80, "MTRI"),
    (81, "OTRI"),
];

/// Short lane label for a GM drum note, `N<note>` outside the GM range.
pub fn drum_label(note: u8) -> String {
    GM_DRUM_LABELS
        .iter()
        .find(|(n, _)| *n == note)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| format!("N{}", note))
}

pub fn is_core_note(note: u8) -> bool {
    CORE_NOTES.contains(&note)
}

/// Representative MIDI velocity for an accent level.
pub fn level_to_velocity(level: u8) -> u8 {
    match level {
        0 => 0,
        1 => 48,
        2 => 88,
        _ => 120,
    }
}

/// Accent level for an incoming MIDI velocity.
pub fn velocity_to_level(velocity: u8) -> u8 {
    match velocity {
        0 => 0,
        1..=59 => 1,
        60..=109 => 2,
        _ => 3,
    }
}

pub fn clamp_on_level(level: u8) -> u8 {
    level.clamp(MIN_ON_LEVEL, MAX_LEVEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_velocity_mapping_is_stable() {
        for level in 0..=MAX_LEVEL {
            assert_eq!(velocity_to_level(level_to_velocity(level)), level);
        }
    }

    #[test]
    fn test_velocity_thresholds() {
        assert_eq!(velocity_to_level(1), 1);
        assert_eq!(velocity_to_level(59), 1);
        assert_eq!(velocity_to_level(60), 2);
        assert_eq!(velocity_to_level(109), 2);
        assert_eq!(velocity_to_level(110), 3);
        assert_eq!(velocity_to_level(127), 3);
    }

    #[test]
    fn test_drum_label_fallback() {
        assert_eq!(drum_label(39), "CLAP");
        assert_eq!(drum_label(20), "N20");
    }

    #[test]
    fn test_default_lanes_cover_core_notes() {
        for note in CORE_NOTES {
            assert!(DEFAULT_DRUM_LANES.iter().any(|(_, n)| *n == note));
        }
    }
}
