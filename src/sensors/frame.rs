use crate::db::models::SensorReading;

/// Minimum token count of a complete frame.
const FRAME_TOKENS: usize = 9;

const SOIL_MOISTURE_TOKEN: usize = 2;
const HUMIDITY_TOKEN: usize = 5;
const TEMPERATURE_TOKEN: usize = 8;

/// Parse one line from the sensor board.
///
/// The board prints label/value/unit groups, e.g.
/// `"Soil moisture: 41 % Humidity: 57 % Temperature: 23 C"`, so the values
/// sit at token 2, 5 and 8.
/// Lines with fewer than nine tokens are not frames and yield `None`; a
/// value token that is not a number reads as 0.
pub fn parse_frame(line: &str) -> Option<SensorReading> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < FRAME_TOKENS {
        return None;
    }

    Some(SensorReading {
        soil_moisture: leading_int(tokens[SOIL_MOISTURE_TOKEN]),
        humidity: leading_int(tokens[HUMIDITY_TOKEN]),
        temperature: leading_int(tokens[TEMPERATURE_TOKEN]),
    })
}

/// Integer prefix of `token` (optional sign, then digits); 0 if there is none.
///
/// Firmware sometimes glues units or decimals to the number (`"57%"`,
/// `"23.5"`), so anything after the digits is ignored.
fn leading_int(token: &str) -> i64 {
    let unsigned = token.trim_start_matches(['+', '-']);
    let sign_len = token.len() - unsigned.len();
    if sign_len > 1 {
        return 0;
    }

    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digits == 0 {
        return 0;
    }

    token[..sign_len + digits].parse().unwrap_or(0)
}
