use serde::{Deserialize, Serialize};

/// Coordinate used for the weather request when geocoding fails.
pub const FALLBACK_COORDINATE: Coordinate = Coordinate::new(51.5033, -0.0794);

/// Center of the tourist map before any city has been resolved.
pub const TOURIST_MAP_HOME: Coordinate = Coordinate::new(51.521_687_1, -0.139_157_4);

/// Degree delta of the detail map region.
pub const DETAIL_SPAN_DEGREES: f64 = 0.01;

/// Extent of the tourist map region, in metres each way.
pub const TOURIST_SPAN_METERS: f64 = 4500.0;

const METERS_PER_DEGREE_LATITUDE: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// Weather-condition descriptor as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: u32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl Condition {
    pub fn icon_url(&self) -> String {
        format!("https://openweathermap.org/img/wn/{}@2x.png", self.icon)
    }

    /// "moderate rain" -> "Moderate Rain"
    pub fn capitalized_description(&self) -> String {
        self.description
            .split(' ')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Weather at one instant (the current reading or an hourly entry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPoint {
    /// Seconds since the unix epoch.
    pub timestamp: i64,
    /// Degrees Celsius.
    pub temperature: f64,
    pub feels_like: Option<f64>,
    /// Percent.
    pub humidity: f64,
    /// hPa.
    pub pressure: f64,
    pub wind_speed: f64,
    pub clouds: Option<f64>,
    pub uvi: Option<f64>,
    /// Probability of precipitation, 0..=1.
    pub pop: Option<f64>,
    pub conditions: Vec<Condition>,
}

impl WeatherPoint {
    pub fn condition(&self) -> Option<&Condition> {
        self.conditions.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayWeather {
    pub timestamp: i64,
    /// Daytime temperature.
    pub temperature: f64,
    pub min: f64,
    pub max: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub pop: Option<f64>,
    pub summary: Option<String>,
    pub conditions: Vec<Condition>,
}

impl DayWeather {
    pub fn condition(&self) -> Option<&Condition> {
        self.conditions.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinutePrecipitation {
    pub timestamp: i64,
    /// mm/h
    pub precipitation: f64,
}

/// One complete provider response. Built in one piece, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    /// Offset from UTC in seconds for `timezone`.
    pub timezone_offset: i32,
    pub current: WeatherPoint,
    pub hourly: Vec<WeatherPoint>,
    pub daily: Vec<DayWeather>,
    pub minutely: Option<Vec<MinutePrecipitation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOfInterest {
    pub id: String,
    pub city_name: String,
    pub name: String,
    pub description: String,
    pub coordinate: Coordinate,
    pub image_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ViewportSpan {
    Degrees {
        latitude_delta: f64,
        longitude_delta: f64,
    },
    Meters {
        latitudinal: f64,
        longitudinal: f64,
    },
}

/// Map center plus visible extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapViewport {
    pub center: Coordinate,
    pub span: ViewportSpan,
}

impl Default for MapViewport {
    fn default() -> Self {
        Self {
            center: Coordinate::default(),
            span: ViewportSpan::Degrees {
                latitude_delta: 0.0,
                longitude_delta: 0.0,
            },
        }
    }
}

impl MapViewport {
    /// Region used by the current-conditions and forecast screens.
    pub fn detail(center: Coordinate) -> Self {
        Self {
            center,
            span: ViewportSpan::Degrees {
                latitude_delta: DETAIL_SPAN_DEGREES,
                longitude_delta: DETAIL_SPAN_DEGREES,
            },
        }
    }

    /// Region used by the tourist places map.
    pub fn tourist(center: Coordinate) -> Self {
        Self {
            center,
            span: ViewportSpan::Meters {
                latitudinal: TOURIST_SPAN_METERS,
                longitudinal: TOURIST_SPAN_METERS,
            },
        }
    }

    /// Visible extent as (latitude delta, longitude delta) in degrees.
    pub fn span_degrees(&self) -> (f64, f64) {
        match self.span {
            ViewportSpan::Degrees {
                latitude_delta,
                longitude_delta,
            } => (latitude_delta, longitude_delta),
            ViewportSpan::Meters {
                latitudinal,
                longitudinal,
            } => {
                let lat = latitudinal / METERS_PER_DEGREE_LATITUDE;
                let cos = self.center.latitude.to_radians().cos().abs();
                // Degenerate at the poles; keep the latitude delta there.
                let lon = if cos < f64::EPSILON {
                    lat
                } else {
                    longitudinal / (METERS_PER_DEGREE_LATITUDE * cos)
                };
                (lat, lon)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(description: &str) -> Condition {
        Condition {
            id: 501,
            main: "Rain".into(),
            description: description.into(),
            icon: "10d".into(),
        }
    }

    #[test]
    fn capitalizes_every_word() {
        assert_eq!(
            condition("moderate rain").capitalized_description(),
            "Moderate Rain"
        );
        assert_eq!(condition("").capitalized_description(), "");
    }

    #[test]
    fn icon_url_uses_2x_asset() {
        assert_eq!(
            condition("rain").icon_url(),
            "https://openweathermap.org/img/wn/10d@2x.png"
        );
    }

    #[test]
    fn detail_viewport_has_fixed_degree_span() {
        let center = Coordinate::new(48.8566, 2.3522);
        let vp = MapViewport::detail(center);
        assert_eq!(vp.center, center);
        assert_eq!(vp.span_degrees(), (0.01, 0.01));
    }

    #[test]
    fn tourist_viewport_converts_meters_to_degrees() {
        let vp = MapViewport::tourist(Coordinate::new(0.0, 0.0));
        let (lat, lon) = vp.span_degrees();
        assert!((lat - 4500.0 / 111_320.0).abs() < 1e-9);
        assert!((lon - lat).abs() < 1e-9);

        let north = MapViewport::tourist(Coordinate::new(60.0, 10.0));
        let (lat, lon) = north.span_degrees();
        // cos(60deg) = 0.5 doubles the longitude extent
        assert!((lon - 2.0 * lat).abs() < 1e-6);
    }

    #[test]
    fn default_viewport_is_the_zero_region() {
        let vp = MapViewport::default();
        assert_eq!(vp.center, Coordinate::new(0.0, 0.0));
        assert_eq!(vp.span_degrees(), (0.0, 0.0));
    }
}
