// Adapter from already-tokenized command lines to thermal requests.
// Only the bed temperature words are understood; everything else is ignored.

use crate::command::{TargetRequest, WaitMode};
use thermal_shared::config::TemperatureUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// `M140` (no wait) or `M190` (wait).
    BedTemperature(TargetRequest),
    /// `M105`
    ReportTemperatures,
}

/// Map one command line to a host command. Returns `None` for blank lines,
/// comments and commands the thermal core does not handle.
///
/// `M140 [I<preset>] [S<temp>] [B<bed>]` sets and returns.
/// `M190 [I<preset>] [S<temp> | R<temp>] [B<bed>]` sets and waits; `S`
/// waits for heating only, `R` and presets also wait for cooling. The mode
/// set here is the one for the explicit value.
pub fn parse_command(line: &str, units: TemperatureUnit) -> Option<HostCommand> {
    let code = line.split(';').next().unwrap_or_default();
    let mut words = code.split_whitespace().peekable();
    // Skip a line number
    if words.peek().is_some_and(|w| is_line_number(w)) {
        words.next();
    }
    let command = words.next()?.to_ascii_uppercase();
    let params: Vec<&str> = words.collect();

    let wait = match command.as_str() {
        "M105" => return Some(HostCommand::ReportTemperatures),
        "M140" => false,
        "M190" => true,
        _ => return None,
    };

    let preset = param(&params, 'I').and_then(parse_byte);
    let heater = param(&params, 'B').and_then(parse_byte);
    let s = param(&params, 'S').and_then(|v| v.parse::<f32>().ok());
    let r = if wait { param(&params, 'R').and_then(|v| v.parse::<f32>().ok()) } else { None };

    // The commander widens this to heating-and-cooling when a preset
    // supplies the temperature
    let mode = match (wait, s) {
        (false, _) => WaitMode::ReturnImmediately,
        (true, Some(_)) => WaitMode::HeatingOnly,
        (true, None) => WaitMode::HeatingAndCooling,
    };

    Some(HostCommand::BedTemperature(TargetRequest {
        preset,
        target: s.or(r).map(|v| units.to_celsius(v)),
        heater,
        mode,
    }))
}

fn is_line_number(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some('N' | 'n')) && chars.as_str().parse::<u32>().is_ok()
}

/// Value of the first `<letter><value>` word. A bare letter has no value.
fn param<'a>(params: &[&'a str], letter: char) -> Option<&'a str> {
    params.iter().find_map(|word| {
        let mut chars = word.chars();
        let first = chars.next()?;
        let value = chars.as_str();
        (first.eq_ignore_ascii_case(&letter) && !value.is_empty()).then_some(value)
    })
}

fn parse_byte(value: &str) -> Option<u8> {
    let v = value.parse::<f32>().ok()?;
    Some(v.clamp(0.0, u8::MAX as f32) as u8)
}
