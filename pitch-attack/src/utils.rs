/// Textual form of a float usable inside a file name: every `.` becomes `-`.
pub fn float_filename(value: f64) -> String {
    value.to_string().replace('.', "-")
}
