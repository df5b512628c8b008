use crate::api::BookDetails;

fn demo_book(
    title: &str,
    author: &str,
    description: &str,
    publication_year: i32,
    pages: i32,
    isbn: &str,
) -> BookDetails {
    BookDetails {
        title: title.to_string(),
        author: author.to_string(),
        description: Some(description.to_string()),
        publication_year: Some(publication_year),
        pages: Some(pages),
        isbn: Some(isbn.to_string()),
        status: None,
    }
}

/// Fixed set of classic novels inserted by the `/api/data/init` endpoint
pub fn demo_books() -> Vec<BookDetails> {
    vec![
        demo_book(
            "War and Peace",
            "Leo Tolstoy",
            "Epic novel depicting Russian society during the Napoleonic wars of 1805-1812.",
            1869,
            1274,
            "978-5-17-102143-9",
        ),
        demo_book(
            "Crime and Punishment",
            "Fyodor Dostoevsky",
            "Psychological novel about a former student who commits a murder and its consequences.",
            1866,
            671,
            "978-5-17-102144-6",
        ),
        demo_book(
            "The Master and Margarita",
            "Mikhail Bulgakov",
            "Novel begun in the late 1920s and worked on until the death of the author.",
            1967,
            384,
            "978-5-17-102145-3",
        ),
        demo_book(
            "Eugene Onegin",
            "Alexander Pushkin",
            "Novel in verse written between 1823 and 1831, a cornerstone of Russian literature.",
            1833,
            352,
            "978-5-17-102146-0",
        ),
        demo_book(
            "Anna Karenina",
            "Leo Tolstoy",
            "Tragic love story of Anna Karenina and count Vronsky set against the family life of Levin and Kitty.",
            1877,
            864,
            "978-5-17-102147-7",
        ),
        demo_book(
            "Fathers and Sons",
            "Ivan Turgenev",
            "Novel written in 1860-1861 and published in 1862.",
            1862,
            224,
            "978-5-17-102148-4",
        ),
        demo_book(
            "Dead Souls",
            "Nikolai Gogol",
            "Work its author himself called a poem.",
            1842,
            352,
            "978-5-17-102149-1",
        ),
        demo_book(
            "A Hero of Our Time",
            "Mikhail Lermontov",
            "Novel written between 1838 and 1840.",
            1840,
            224,
            "978-5-17-102150-7",
        ),
    ]
}
