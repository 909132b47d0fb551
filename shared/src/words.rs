//! Word bank for turn prompts.
//!
//! Words are grouped into themed pools plus a mixed pool. Draws consult a
//! caller-owned used-word set so the same word is not offered twice in a
//! session; when the filtered pool underflows the requested count the draw
//! falls back to the full pool for that draw only, trading a rare repeat for
//! guaranteed forward progress.

use std::collections::HashSet;

use rand::seq::SliceRandom;

const ANIMALS: &[&str] = &[
    "Cat", "Dog", "Rabbit", "Elephant", "Lion", "Tiger", "Bear", "Fox", "Wolf",
    "Deer", "Giraffe", "Monkey", "Snake", "Shark", "Whale", "Dolphin", "Penguin",
    "Frog", "Duck", "Horse", "Owl", "Eagle", "Parrot", "Butterfly", "Spider",
    "Octopus", "Jellyfish", "Zebra", "Panda", "Koala", "Kangaroo", "Camel",
    "Hedgehog", "Squirrel", "Flamingo", "Peacock", "Crocodile", "Turtle",
    "Lobster", "Manta Ray",
];

const FOOD: &[&str] = &[
    "Pizza", "Burger", "Sushi", "Taco", "Sandwich", "Pasta", "Salad", "Soup",
    "Cake", "Ice Cream", "Chocolate", "Bread", "Cheese", "Apple", "Banana",
    "Orange", "Grape", "Strawberry", "Watermelon", "Pineapple", "Lemon",
    "Potato", "Tomato", "Carrot", "Cookie", "Donut", "Pancake", "Waffle",
    "Hot Dog", "Burrito", "Popcorn", "Pretzel", "Croissant", "Cupcake",
    "Lollipop", "Milkshake", "Dumpling", "Fried Chicken", "Fish and Chips",
];

const OBJECTS: &[&str] = &[
    "Chair", "Table", "Lamp", "Computer", "Phone", "Book", "Pen", "Clock",
    "Key", "Bag", "Shoes", "Glasses", "Hat", "Watch", "Ring", "Guitar",
    "Piano", "Drum", "Violin", "Camera", "Headphones", "Car", "Bike", "Bus",
    "Train", "Plane", "Boat", "Rocket", "Robot", "Ball", "Helmet", "Umbrella",
    "Mirror", "Window", "Door", "Bridge", "Map", "Flag", "Wallet", "Suitcase",
    "Bottle", "Mug", "Spoon", "Fork",
];

const ACTIONS: &[&str] = &[
    "Run", "Jump", "Swim", "Fly", "Sleep", "Eat", "Drink", "Read", "Write",
    "Draw", "Sing", "Dance", "Cry", "Laugh", "Cook", "Clean", "Drive", "Climb",
    "Dig", "Build", "Fix", "Paint", "Think", "Dream", "Teach", "Win", "Throw",
    "Catch", "Kick", "Hug",
];

const NATURE: &[&str] = &[
    "Beach", "Mountain", "Forest", "Desert", "Jungle", "Island", "Ocean",
    "River", "Lake", "Waterfall", "Volcano", "Cave", "Canyon", "Garden",
    "Farm", "City", "Moon", "Sun", "Star", "Planet", "Cloud", "Rain", "Snow",
    "Storm", "Fire", "Tree", "Flower", "Leaf", "Sand",
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("Animals", ANIMALS),
    ("Food", FOOD),
    ("Objects", OBJECTS),
    ("Actions", ACTIONS),
    ("Nature", NATURE),
];

/// Names of the themed pools (the mixed pool is the fallback, not listed).
pub fn category_names() -> Vec<&'static str> {
    CATEGORIES.iter().map(|(name, _)| *name).collect()
}

/// The full pool for a category, case-insensitive; any unknown name (or
/// "Mix") yields the concatenation of every pool.
pub fn category_pool(category: &str) -> Vec<&'static str> {
    for (name, pool) in CATEGORIES {
        if name.eq_ignore_ascii_case(category) {
            return pool.to_vec();
        }
    }
    CATEGORIES.iter().flat_map(|(_, pool)| pool.iter().copied()).collect()
}

/// Draws `count` distinct words from a category, skipping words in `used`.
///
/// If skipping would leave fewer than `count` candidates, the used-word
/// filter is dropped for this draw so the game never stalls on an exhausted
/// pool. Returns fewer than `count` only if the whole category is smaller
/// than `count`.
pub fn random_words(category: &str, count: usize, used: &HashSet<String>) -> Vec<String> {
    let full = category_pool(category);
    let mut pool: Vec<&str> = full
        .iter()
        .copied()
        .filter(|w| !used.contains(*w))
        .collect();

    if pool.len() < count {
        log::warn!(
            "word pool for '{}' exhausted ({} left), ignoring history for this draw",
            category,
            pool.len()
        );
        pool = full;
    }

    let mut rng = rand::thread_rng();
    pool.choose_multiple(&mut rng, count)
        .map(|w| w.to_string())
        .collect()
}
