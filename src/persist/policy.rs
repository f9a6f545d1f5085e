//! Which cached values get written for the sensors a plant has attached.

use std::collections::HashSet;

use crate::db::models::{SensorKind, SensorReading};

/// Presence of each canonical sensor kind in the active binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Availability {
    pub temperature: bool,
    pub humidity: bool,
    pub soil_moisture: bool,
}

impl Availability {
    /// Names that do not parse as a [`SensorKind`] are ignored.
    pub fn from_names(names: &HashSet<String>) -> Self {
        let mut available = Self::default();
        for kind in names.iter().filter_map(|name| name.parse::<SensorKind>().ok()) {
            match kind {
                SensorKind::Temperature => available.temperature = true,
                SensorKind::Humidity => available.humidity = true,
                SensorKind::SoilMoisture => available.soil_moisture = true,
            }
        }
        available
    }

    fn key(self) -> usize {
        (self.temperature as usize) << 2 | (self.humidity as usize) << 1 | self.soil_moisture as usize
    }
}

/// Kinds whose live value is written; every other field is written as 0.
type Keep = &'static [SensorKind];

use SensorKind::{Humidity as H, SoilMoisture as S, Temperature as T};

/// Indexed by `Availability::key` (temperature, humidity, soil_moisture bits).
/// `None` means nothing is written at all.
const POLICY: [Option<Keep>; 8] = [
    /* n n n */ None,
    /* n n y */ Some(&[S]),
    /* n y n */ Some(&[H]),
    /* n y y */ Some(&[H, S]),
    /* y n n */ Some(&[T]),
    /* y n y */ Some(&[T, S]),
    /* y y n */ Some(&[T, H]),
    /* y y y */ Some(&[T, H, S]),
];

/// The triple to persist for `available` sensors, or `None` to skip the write.
pub fn select(available: Availability, live: SensorReading) -> Option<SensorReading> {
    let keep = POLICY[available.key()]?;
    let pick = |kind: SensorKind| if keep.contains(&kind) { live.value(kind) } else { 0 };

    Some(SensorReading {
        soil_moisture: pick(S),
        humidity: pick(H),
        temperature: pick(T),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIVE: SensorReading = SensorReading {
        soil_moisture: 41,
        humidity: 57,
        temperature: 23,
    };

    fn avail(temperature: bool, humidity: bool, soil_moisture: bool) -> Availability {
        Availability {
            temperature,
            humidity,
            soil_moisture,
        }
    }

    /// (temperature, humidity, soil) as the plant record stores them.
    fn triple(r: SensorReading) -> (i64, i64, i64) {
        (r.temperature, r.humidity, r.soil_moisture)
    }

    #[test]
    fn decision_table() {
        let rows = [
            (avail(true, true, true), Some((23, 57, 41))),
            (avail(true, true, false), Some((23, 57, 0))),
            (avail(true, false, true), Some((23, 0, 41))),
            (avail(false, true, true), Some((0, 57, 41))),
            (avail(true, false, false), Some((23, 0, 0))),
            (avail(false, true, false), Some((0, 57, 0))),
            (avail(false, false, true), Some((0, 0, 41))),
            (avail(false, false, false), None),
        ];

        for (available, expected) in rows {
            assert_eq!(select(available, LIVE).map(triple), expected, "{available:?}");
        }
    }

    #[test]
    fn temperature_and_soil_ignore_live_humidity() {
        let names = HashSet::from(["temperature".to_owned(), "soil_moisture".to_owned()]);
        let live = SensorReading {
            humidity: 99,
            ..LIVE
        };

        let persisted = select(Availability::from_names(&names), live).unwrap();
        assert_eq!(triple(persisted), (23, 0, 41));
    }

    #[test]
    fn from_names_maps_every_device_name() {
        let names = HashSet::from([
            "temperature".to_owned(),
            "humidity".to_owned(),
            "soil_moisture".to_owned(),
            "light".to_owned(),
        ]);
        assert_eq!(
            Availability::from_names(&names),
            Availability {
                temperature: true,
                humidity: true,
                soil_moisture: true,
            }
        );
    }

    #[test]
    fn unknown_names_count_as_absent() {
        let names = HashSet::from(["light".to_owned(), "co2".to_owned()]);
        assert_eq!(Availability::from_names(&names), Availability::default());
        assert_eq!(select(Availability::from_names(&names), LIVE), None);
    }
}
