/// Selects which topics a cursor yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicFilter {
    /// Every record in the bag.
    All,
    /// Records on exactly this topic.
    Topic(String),
    /// Records on any of these topics.
    AnyOf(Vec<String>),
}

impl TopicFilter {
    pub fn topic(topic: impl Into<String>) -> Self {
        TopicFilter::Topic(topic.into())
    }

    pub fn any_of<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TopicFilter::AnyOf(topics.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, topic: &str) -> bool {
        match self {
            TopicFilter::All => true,
            TopicFilter::Topic(wanted) => wanted == topic,
            TopicFilter::AnyOf(wanted) => wanted.iter().any(|t| t == topic),
        }
    }
}

impl From<&str> for TopicFilter {
    fn from(topic: &str) -> Self {
        TopicFilter::topic(topic)
    }
}

impl From<String> for TopicFilter {
    fn from(topic: String) -> Self {
        TopicFilter::Topic(topic)
    }
}
