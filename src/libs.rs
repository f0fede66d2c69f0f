pub(crate) mod catalogue;
