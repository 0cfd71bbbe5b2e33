/// Picks the content of a greeting. Implementations must be deterministic for
/// a given index; the caller owns the randomness.
pub trait TemplateSelector: Send + Sync {
    fn select(&self, index: usize) -> String;
}

const GREETINGS: [&str; 10] = [
    "<h1>Good morning, sunshine!</h1><p>Today is a fresh page. Write something kind on it.</p>",
    "<h1>Rise and shine!</h1><p>Small steps still move you forward. Take one today.</p>",
    "<h1>Hello, early bird!</h1><p>The coffee is warm and the day is yours.</p>",
    "<h1>Good morning!</h1><p>Be the reason someone smiles today.</p>",
    "<h1>A brand new day</h1><p>Yesterday is done. Today only asks you to show up.</p>",
    "<h1>Morning, friend!</h1><p>Drink some water, stretch a little and go get it.</p>",
    "<h1>Wake up and glow</h1><p>You handled every hard day so far. This one too.</p>",
    "<h1>Sunny side up</h1><p>Look for the good in the next person you meet.</p>",
    "<h1>Good morning, star!</h1><p>Progress, not perfection.</p>",
    "<h1>Hello, today!</h1><p>Something good is on its way. Keep an eye out for it.</p>",
];

/// Built-in library of greeting fragments.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreetingTemplates;

impl TemplateSelector for GreetingTemplates {
    fn select(&self, index: usize) -> String {
        GREETINGS[index % GREETINGS.len()].to_string()
    }
}

/// Wraps a greeting fragment into the HTML document that gets mailed.
pub fn render_greeting(fragment: &str) -> String {
    format!(
        r#"
            <html>
                <body>
                    {}
                    <p>Have a wonderful day!<br>The Daily Greeting team</p>
                </body>
            </html>
        "#,
        fragment
    )
}
