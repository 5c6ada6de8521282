#[macro_export]
macro_rules! id {
    ($name:ident) => {
        #[derive(
            Copy, Clone,
            Debug, derive_more::Display,
            PartialEq, Eq, Hash, PartialOrd, Ord,
            derive_more::From,
            sqlx::Type
        )]
        #[sqlx(transparent)]
        pub struct $name(i64);
    };
    ($($name:ident),+) => {
        $($crate::id!($name);)+
    }
}
