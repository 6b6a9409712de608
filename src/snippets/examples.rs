//! Built-in starter programs, available without an account.

/// A named starter program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleProgram {
    pub name: &'static str,
    pub title: &'static str,
    pub code: &'static str,
}

/// All starter programs, in menu order.
pub fn example_programs() -> &'static [ExampleProgram] {
    EXAMPLES
}

/// Look up a starter program by its short name.
pub fn example_by_name(name: &str) -> Option<&'static ExampleProgram> {
    EXAMPLES.iter().find(|e| e.name == name)
}

const EXAMPLES: &[ExampleProgram] = &[
    ExampleProgram {
        name: "hello",
        title: "Hello, World!",
        code: r#"print("Hello, World!")
print("Welcome to Python Practice!")"#,
    },
    ExampleProgram {
        name: "math",
        title: "Math Operations",
        code: r#"import math

# Basic math operations
a, b = 10, 3
print(f"{a} + {b} = {a + b}")
print(f"{a} - {b} = {a - b}")
print(f"{a} * {b} = {a * b}")
print(f"{a} / {b} = {a / b:.2f}")
print(f"{a} ** {b} = {a ** b}")

# Math module functions
print(f"sqrt(16) = {math.sqrt(16)}")
print(f"sin(π/2) = {math.sin(math.pi/2):.2f}")"#,
    },
    ExampleProgram {
        name: "loops",
        title: "Loops and Comprehensions",
        code: r#"# List comprehension
numbers = list(range(1, 11))
print("Numbers:", numbers)

squares = [x**2 for x in numbers]
print("Squares:", squares)

# For loop
print("Even numbers:")
for num in numbers:
    if num % 2 == 0:
        print(f"  {num}")

# While loop
count = 0
factorial = 1
n = 5
while count < n:
    count += 1
    factorial *= count
print(f"{n}! = {factorial}")"#,
    },
    ExampleProgram {
        name: "functions",
        title: "Functions",
        code: r#"def greet(name, age=None):
    if age:
        return f"Hello {name}, you are {age} years old!"
    return f"Hello {name}!"

def calculate_area(shape, **kwargs):
    if shape == "rectangle":
        return kwargs["width"] * kwargs["height"]
    elif shape == "circle":
        import math
        return math.pi * kwargs["radius"] ** 2
    return 0

# Test functions
print(greet("Alice"))
print(greet("Bob", 25))

rect_area = calculate_area("rectangle", width=5, height=3)
circle_area = calculate_area("circle", radius=4)

print(f"Rectangle area: {rect_area}")
print(f"Circle area: {circle_area:.2f}")"#,
    },
    ExampleProgram {
        name: "numpy",
        title: "NumPy Arrays",
        code: r#"import numpy as np

# Create arrays
arr1 = np.array([1, 2, 3, 4, 5])
arr2 = np.array([6, 7, 8, 9, 10])

print("Array 1:", arr1)
print("Array 2:", arr2)

# Basic operations
print("Sum:", arr1 + arr2)
print("Product:", arr1 * arr2)
print("Mean of arr1:", np.mean(arr1))

# 2D array
matrix = np.array([[1, 2, 3], [4, 5, 6], [7, 8, 9]])
print("Matrix:")
print(matrix)
print("Matrix transpose:")
print(matrix.T)"#,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let hello = example_by_name("hello").unwrap();
        assert!(hello.code.starts_with("print(\"Hello, World!\")"));
        assert!(example_by_name("fortran").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = example_programs().iter().map(|e| e.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), example_programs().len());
    }
}
