use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    error::WeatherError,
    model::{
        Condition, Coordinate, DayWeather, MinutePrecipitation, WeatherPoint, WeatherSnapshot,
    },
    provider::truncate_body,
};

use super::WeatherProvider;

const ONE_CALL_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";

/// OpenWeather "One Call" client: current, minutely, hourly and daily in one request.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: Option<String>, http: Client) -> Self {
        Self {
            api_key,
            base_url: ONE_CALL_URL.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    #[instrument(skip(self), fields(lat = at.latitude, lon = at.longitude))]
    async fn fetch(&self, at: Coordinate) -> Result<WeatherSnapshot, WeatherError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                WeatherError::Configuration(
                    "no OpenWeather API key; run `citycast configure` or set OPENWEATHER_API_KEY"
                        .to_string(),
                )
            })?;

        let lat = at.latitude.to_string();
        let lon = at.longitude.to_string();

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("units", "metric"),
                ("appid", api_key),
            ])
            .send()
            .await
            .map_err(|e| {
                WeatherError::Transport(format!("failed to send request to OpenWeather: {e}"))
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            WeatherError::Transport(format!("failed to read OpenWeather response body: {e}"))
        })?;

        if !status.is_success() {
            return Err(WeatherError::Transport(format!(
                "OpenWeather request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: OwOneCallResponse =
            serde_json::from_str(&body).map_err(|source| WeatherError::Decoding { source })?;

        debug!(
            "OpenWeather returned {} hourly and {} daily entries",
            parsed.hourly.len(),
            parsed.daily.len()
        );

        Ok(parsed.into())
    }
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    id: u32,
    #[serde(default)]
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwPoint {
    dt: i64,
    temp: f64,
    feels_like: Option<f64>,
    humidity: f64,
    pressure: f64,
    wind_speed: f64,
    clouds: Option<f64>,
    uvi: Option<f64>,
    pop: Option<f64>,
    weather: Vec<OwCondition>,
}

#[derive(Debug, Deserialize)]
struct OwDayTemp {
    day: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct OwDay {
    dt: i64,
    temp: OwDayTemp,
    humidity: f64,
    pressure: f64,
    wind_speed: f64,
    pop: Option<f64>,
    summary: Option<String>,
    weather: Vec<OwCondition>,
}

#[derive(Debug, Deserialize)]
struct OwMinute {
    dt: i64,
    precipitation: f64,
}

#[derive(Debug, Deserialize)]
struct OwOneCallResponse {
    lat: f64,
    lon: f64,
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    timezone_offset: i32,
    current: OwPoint,
    minutely: Option<Vec<OwMinute>>,
    hourly: Vec<OwPoint>,
    daily: Vec<OwDay>,
}

impl From<OwCondition> for Condition {
    fn from(w: OwCondition) -> Self {
        Condition {
            id: w.id,
            main: w.main,
            description: w.description,
            icon: w.icon,
        }
    }
}

impl From<OwPoint> for WeatherPoint {
    fn from(p: OwPoint) -> Self {
        WeatherPoint {
            timestamp: p.dt,
            temperature: p.temp,
            feels_like: p.feels_like,
            humidity: p.humidity,
            pressure: p.pressure,
            wind_speed: p.wind_speed,
            clouds: p.clouds,
            uvi: p.uvi,
            pop: p.pop,
            conditions: p.weather.into_iter().map(Condition::from).collect(),
        }
    }
}

impl From<OwDay> for DayWeather {
    fn from(d: OwDay) -> Self {
        DayWeather {
            timestamp: d.dt,
            temperature: d.temp.day,
            min: d.temp.min,
            max: d.temp.max,
            humidity: d.humidity,
            pressure: d.pressure,
            wind_speed: d.wind_speed,
            pop: d.pop,
            summary: d.summary,
            conditions: d.weather.into_iter().map(Condition::from).collect(),
        }
    }
}

// Provider order is kept as-is; entries are not re-sorted.
impl From<OwOneCallResponse> for WeatherSnapshot {
    fn from(r: OwOneCallResponse) -> Self {
        WeatherSnapshot {
            latitude: r.lat,
            longitude: r.lon,
            timezone: r.timezone,
            timezone_offset: r.timezone_offset,
            current: r.current.into(),
            hourly: r.hourly.into_iter().map(WeatherPoint::from).collect(),
            daily: r.daily.into_iter().map(DayWeather::from).collect(),
            minutely: r.minutely.map(|minutes| {
                minutes
                    .into_iter()
                    .map(|m| MinutePrecipitation {
                        timestamp: m.dt,
                        precipitation: m.precipitation,
                    })
                    .collect()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn point(dt: i64, temp: f64) -> Value {
        json!({
            "dt": dt,
            "temp": temp,
            "feels_like": temp - 1.0,
            "pressure": 1012,
            "humidity": 81,
            "clouds": 75,
            "uvi": 0.4,
            "wind_speed": 4.63,
            "weather": [
                { "id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d" }
            ]
        })
    }

    fn day(dt: i64, min: f64, max: f64) -> Value {
        json!({
            "dt": dt,
            "summary": "Expect a day of partly cloudy with rain",
            "temp": { "day": max - 1.0, "min": min, "max": max, "night": min, "eve": max, "morn": min },
            "pressure": 1008,
            "humidity": 77,
            "wind_speed": 6.1,
            "pop": 0.8,
            "weather": [
                { "id": 500, "main": "Rain", "description": "light rain", "icon": "10d" }
            ]
        })
    }

    fn one_call_body() -> Value {
        json!({
            "lat": 51.5074,
            "lon": -0.1278,
            "timezone": "Europe/London",
            "timezone_offset": 0,
            "current": point(1_700_000_000, 9.5),
            "minutely": [
                { "dt": 1_700_000_040, "precipitation": 0.0 },
                { "dt": 1_700_000_100, "precipitation": 0.2 }
            ],
            "hourly": [point(1_700_002_800, 9.8), point(1_700_006_400, 10.1), point(1_700_010_000, 8.7)],
            "daily": [day(1_699_995_600, 5.0, 11.0), day(1_700_082_000, 4.0, 8.0)]
        })
    }

    async fn client_for(server: &MockServer, key: Option<&str>) -> OpenWeatherClient {
        OpenWeatherClient::new(key.map(str::to_string), Client::new())
            .with_base_url(format!("{}/data/3.0/onecall", server.uri()))
    }

    #[tokio::test]
    async fn fetch_sends_expected_query_and_decodes_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall"))
            .and(query_param("lat", "51.5074"))
            .and(query_param("lon", "-0.1278"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_call_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("KEY")).await;
        let snapshot = client
            .fetch(Coordinate::new(51.5074, -0.1278))
            .await
            .unwrap();

        assert_eq!(snapshot.timezone, "Europe/London");
        assert_eq!(snapshot.current.timestamp, 1_700_000_000);
        assert_eq!(snapshot.current.temperature, 9.5);
        assert_eq!(snapshot.current.humidity, 81.0);
        assert_eq!(
            snapshot.current.condition().map(|c| c.icon.as_str()),
            Some("04d")
        );

        let hours: Vec<i64> = snapshot.hourly.iter().map(|h| h.timestamp).collect();
        assert_eq!(hours, vec![1_700_002_800, 1_700_006_400, 1_700_010_000]);

        assert_eq!(snapshot.daily.len(), 2);
        assert_eq!(snapshot.daily[0].min, 5.0);
        assert_eq!(snapshot.daily[0].max, 11.0);
        assert_eq!(snapshot.minutely.as_ref().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn provider_order_is_not_resorted() {
        let server = MockServer::start().await;
        let mut body = one_call_body();
        body["hourly"] = json!([point(30, 1.0), point(10, 2.0), point(20, 3.0)]);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let snapshot = client_for(&server, Some("KEY"))
            .await
            .fetch(Coordinate::new(0.0, 0.0))
            .await
            .unwrap();

        let hours: Vec<i64> = snapshot.hourly.iter().map(|h| h.timestamp).collect();
        assert_eq!(hours, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn empty_arrays_and_missing_minutely_are_valid() {
        let server = MockServer::start().await;
        let mut body = one_call_body();
        body["hourly"] = json!([]);
        body["daily"] = json!([]);
        body.as_object_mut().unwrap().remove("minutely");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let snapshot = client_for(&server, Some("KEY"))
            .await
            .fetch(Coordinate::new(0.0, 0.0))
            .await
            .unwrap();

        assert!(snapshot.hourly.is_empty());
        assert!(snapshot.daily.is_empty());
        assert!(snapshot.minutely.is_none());
    }

    #[tokio::test]
    async fn missing_key_is_configuration_error_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_call_body()))
            .expect(0)
            .mount(&server)
            .await;

        for key in [None, Some(""), Some("   ")] {
            let err = client_for(&server, key)
                .await
                .fetch(Coordinate::new(0.0, 0.0))
                .await
                .unwrap_err();
            assert!(matches!(err, WeatherError::Configuration(_)));
        }
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string("{\"cod\":401,\"message\":\"Invalid API key\"}"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, Some("BAD"))
            .await
            .fetch(Coordinate::new(0.0, 0.0))
            .await
            .unwrap_err();

        match err {
            WeatherError::Transport(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("Invalid API key"));
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let client = OpenWeatherClient::new(Some("KEY".into()), Client::new())
            .with_base_url("http://127.0.0.1:9/onecall");
        let err = client.fetch(Coordinate::new(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, WeatherError::Transport(_)));
    }

    #[tokio::test]
    async fn schema_mismatch_is_decoding_error() {
        let server = MockServer::start().await;
        let mut body = one_call_body();
        body["current"]["temp"] = json!("warm");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("KEY"))
            .await
            .fetch(Coordinate::new(0.0, 0.0))
            .await
            .unwrap_err();

        match err {
            WeatherError::Decoding { source } => assert!(source.to_string().contains("invalid type")),
            other => panic!("expected decoding error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_daily_is_decoding_error() {
        let server = MockServer::start().await;
        let mut body = one_call_body();
        body.as_object_mut().unwrap().remove("daily");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("KEY"))
            .await
            .fetch(Coordinate::new(0.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Decoding { .. }));
    }
}
