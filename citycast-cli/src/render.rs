//! Terminal rendering of the published state.

use chrono::Local;
use citycast_core::{
    PublishedState, WeatherSnapshot,
    format::{DateStyle, format_timestamp},
};

use crate::cli::View;

const HOURS_SHOWN: usize = 12;

pub fn render(state: &PublishedState, view: View) {
    println!(
        "== {} (rendered {}) ==",
        state.city,
        Local::now().format("%H:%M:%S")
    );

    match view {
        View::Now => now(state),
        View::Forecast => forecast(state),
        View::Places => places(state),
        View::All => {
            now(state);
            forecast(state);
            places(state);
        }
    }
}

fn now(state: &PublishedState) {
    println!();
    println!("Current Location: {}", state.city);
    if let Some(coordinate) = state.coordinate {
        println!("Coordinates: {coordinate}");
    }

    let Some(weather) = &state.weather else {
        println!("Temp: N/A");
        return;
    };

    let current = &weather.current;
    println!(
        "{}",
        format_timestamp(current.timestamp, DateStyle::DateTime, weather.timezone_offset)
    );
    if let Some(condition) = current.condition() {
        println!("{}  ({})", condition.capitalized_description(), condition.icon_url());
    }
    println!("Temp: {:.2} ºC", current.temperature);
    println!("Humidity: {:.0} %", current.humidity);
    println!("Pressure: {:.0} hPa", current.pressure);
    println!("Windspeed: {:.0} m/s", current.wind_speed);
}

fn forecast(state: &PublishedState) {
    println!();
    let Some(weather) = &state.weather else {
        println!("Forecast: N/A");
        return;
    };

    println!("Hourly");
    for hour in weather.hourly.iter().take(HOURS_SHOWN) {
        println!(
            "  {:<10} {:>5.1}ºC  {}",
            format_timestamp(hour.timestamp, DateStyle::HourWithDay, weather.timezone_offset),
            hour.temperature,
            description(hour.condition().map(|c| c.capitalized_description())),
        );
    }

    println!("Daily");
    for day in &weather.daily {
        println!(
            "  {:<14} {:<20} {}ºC/{}ºC",
            format_timestamp(day.timestamp, DateStyle::WeekdayAndDay, weather.timezone_offset),
            description(day.condition().map(|c| c.capitalized_description())),
            day.max as i64,
            day.min as i64,
        );
    }

    rain_next_hour(weather);
}

fn rain_next_hour(weather: &WeatherSnapshot) {
    let Some(minutes) = &weather.minutely else {
        return;
    };
    if let Some(first_wet) = minutes.iter().find(|m| m.precipitation > 0.0) {
        println!(
            "Rain expected from {}",
            format_timestamp(first_wet.timestamp, DateStyle::Time, weather.timezone_offset)
        );
    } else if !minutes.is_empty() {
        println!("No rain expected within the hour");
    }
}

fn places(state: &PublishedState) {
    println!();
    println!("Tourist Attractions in {}", state.city);

    let (lat_delta, lon_delta) = state.tourist_viewport.span_degrees();
    println!(
        "Map: centre {} span {:.4}° x {:.4}°",
        state.tourist_viewport.center, lat_delta, lon_delta
    );

    match state.places.as_deref() {
        None => println!("  (not loaded)"),
        Some([]) => println!("  No tourist places listed for this city"),
        Some(places) => {
            for place in places {
                println!("  {} {}", place.name, place.coordinate);
                println!("    Description: {}", place.description);
                if let Some(image) = place.image_names.first() {
                    println!("    Image: {image}");
                }
            }
        }
    }
}

fn description(text: Option<String>) -> String {
    text.unwrap_or_else(|| "-".to_string())
}
