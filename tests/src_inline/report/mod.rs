use super::*;

#[test]
fn test_format_pvalue() {
    assert_eq!(format_pvalue(0.0), "0.000000");
    assert_eq!(format_pvalue(1.0), "1.000000");
    assert_eq!(format_pvalue(0.0125), "0.012500");
    assert_eq!(format_pvalue(0.00001234), "1.234000e-5");
}

#[test]
fn test_fraction() {
    assert_eq!(fraction(1, 4), 0.25);
    assert_eq!(fraction(3, 0), 0.0);
}

#[test]
fn test_format_f64_6() {
    assert_eq!(format_f64_6(1.5), "1.500000");
    assert_eq!(format_f64_6(2.0 / 3.0), "0.666667");
}
