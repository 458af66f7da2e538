//! Errors raised while configuring, training, querying or persisting a forest.

error_chain!{
    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
    }

    errors {
        /// An option was set to a value outside of its valid range.
        InvalidOption(name: &'static str, value: String) {
            description("invalid option value")
            display("Invalid value {} for option '{}'", value, name)
        }
        /// Votes can only be cast for object classes (never for the background class 0).
        InvalidQueryClass(class: usize, num_classes: usize) {
            description("invalid query class")
            display("Cannot vote for class {}: valid object classes are 1..{}", class, num_classes)
        }
        /// A vector or table does not have the size the forest expects.
        DimensionMismatch(what: &'static str, expected: usize, found: usize) {
            description("dimension mismatch")
            display("Dimension mismatch for {}: expected {}, found {}", what, expected, found)
        }
        InvalidTrainingData(msg: String) {
            description("invalid training data")
            display("Invalid training data: {}", msg)
        }
        /// A stream or file does not hold a valid forest or option set.
        CorruptStream(msg: String) {
            description("corrupt stream")
            display("Corrupt stream: {}", msg)
        }
    }
}
