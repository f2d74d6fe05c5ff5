use chrono::Local;

/// The current month as `YYYYMM`, used to prefill the trade search form.
pub fn current_year_month() -> String {
    Local::now().format("%Y%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_month_is_six_digits() {
        let month = current_year_month();
        assert_eq!(month.len(), 6);
        assert!(month.chars().all(|c| c.is_ascii_digit()));
    }
}
