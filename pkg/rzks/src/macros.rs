/// Helper macro to create a batch of (label, value) pairs for
/// [`Tree::update`]
///
/// ```rust
/// # use rzks::*;
/// let mut tree = Tree::init(Config::generate_parameters(), MemoryStore::new()).unwrap();
///
/// let (com, seqno) = tree
///     .update(&Context::new(), batch! {
///         "alice" => "pk-1",
///         "bob" => "pk-2",
///     })
///     .unwrap();
/// # let _ = (com, seqno);
/// ```
///
/// [`Tree::update`]: crate::Tree::update
#[macro_export]
macro_rules! batch {
    {} => {{
        ::std::vec::Vec::<(::std::vec::Vec<u8>, ::std::vec::Vec<u8>)>::new()
    }};
    { $($label:expr => $value:expr),+ $(,)? } => {{
        ::std::vec![$(
            (
                ::std::vec::Vec::<u8>::from($label),
                ::std::vec::Vec::<u8>::from($value),
            )
        ),+]
    }};
}
