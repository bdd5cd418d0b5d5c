#[doc(hidden)]
#[macro_export]
macro_rules! assert_eq_float {
    ($a:expr, $b:expr) => {
        $crate::assert_eq_float!($a, $b, 0.00001);
    };
    ($a:expr, $b:expr, $eps:expr) => {
        assert!(($a - $b).abs() < $eps, "{} != {} (eps {})", $a, $b, $eps);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! assert_eq_float_slice {
    ($a:expr, $b:expr) => {
        $crate::assert_eq_float_slice!($a, $b, 0.00001);
    };
    ($a:expr, $b:expr, $eps:expr) => {
        let a = $a;
        let b = $b;

        assert_eq!(a.len(), b.len());
        for (a, b) in std::iter::zip(a, b) {
            $crate::assert_eq_float!(a, b, $eps);
        }
    };
}
