//! Human-friendly text output.

use std::fmt::Write as _;

use citywx_core::{AppState, FavoriteCity, Favorites, WeatherReport};

const COMPASS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

pub fn temperature(celsius: f64) -> String {
    // Avoid printing "-0°C".
    let rounded = celsius.round();
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded}°C")
}

pub fn compass(degrees: u16) -> &'static str {
    let index = ((f64::from(degrees % 360) / 45.0).round() as usize) % COMPASS.len();
    COMPASS[index]
}

pub fn wind(speed: f64, direction: Option<u16>) -> String {
    match direction {
        Some(deg) => format!("{speed:.1} m/s {}", compass(deg)),
        None => format!("{speed:.1} m/s"),
    }
}

pub fn visibility(meters: u32) -> String {
    if meters >= 1000 {
        format!("{:.1} km", f64::from(meters) / 1000.0)
    } else {
        format!("{meters} m")
    }
}

pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn city_label(name: &str, country: &str) -> String {
    if country.is_empty() {
        name.to_string()
    } else {
        format!("{name}, {country}")
    }
}

/// Multi-line weather summary. `saved` drives the favorite marker.
pub fn report(report: &WeatherReport, saved: bool) -> String {
    let mut out = String::new();
    let marker = if saved { "★" } else { "☆" };

    let _ = writeln!(out, "{marker} {}", city_label(&report.name, &report.country));

    let condition = report
        .primary_condition()
        .map(|c| capitalize(&c.description))
        .unwrap_or_else(|| "Unknown".to_string());
    let _ = writeln!(
        out,
        "  {}  {condition}  (feels like {})",
        temperature(report.temperature),
        temperature(report.feels_like)
    );
    let _ = writeln!(
        out,
        "  Low {} / High {}",
        temperature(report.temp_min),
        temperature(report.temp_max)
    );
    let _ = writeln!(
        out,
        "  Humidity {}%   Pressure {} hPa   Wind {}",
        report.humidity,
        report.pressure,
        wind(report.wind_speed, report.wind_direction)
    );
    if let Some(meters) = report.visibility {
        let _ = writeln!(out, "  Visibility {}", visibility(meters));
    }

    if let (Some(rise), Some(set)) = (report.sunrise_local(), report.sunset_local()) {
        let _ = writeln!(
            out,
            "  Sunrise {}   Sunset {}",
            rise.format("%H:%M"),
            set.format("%H:%M")
        );
    }
    if let Some(observed) = report.observed_local() {
        let _ = writeln!(out, "  Observed {}", observed.format("%Y-%m-%d %H:%M"));
    }

    out
}

pub fn favorite(city: &FavoriteCity) -> String {
    format!("{} (id {})", city_label(&city.name, &city.country), city.id)
}

pub fn favorites(favorites: &Favorites) -> String {
    if favorites.is_empty() {
        return "No saved cities yet.\n".to_string();
    }

    let mut out = String::new();
    for (i, city) in favorites.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {}", i + 1, favorite(city));
    }
    out
}

pub fn error_banner(message: &str) -> String {
    format!("! {message}\n")
}

/// The whole page: banner, loading indicator, summary and saved cities.
pub fn state(state: &AppState) -> String {
    let mut out = String::new();

    if let Some(error) = &state.error {
        out.push_str(&error_banner(error));
    }
    if state.loading {
        out.push_str("Loading...\n");
    }
    match &state.report {
        Some(r) => out.push_str(&report(r, state.is_current_favorite())),
        None if state.error.is_none() && !state.loading => {
            out.push_str("Search for a city to see its weather.\n");
        }
        None => {}
    }

    out.push_str("\nSaved cities:\n");
    out.push_str(&favorites(&state.favorites));
    out
}
