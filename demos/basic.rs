//! Allocates a few blocks, frees them and prints the allocation map and the
//! usage summary along the way. Run with `RUST_LOG=chainalloc=debug` to see
//! every allocation.

use chainalloc::Heap;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chainalloc=info".parse().unwrap()),
        )
        .init();

    let mut heap = Heap::with_capacity(4096);

    let a = heap.allocate(64).unwrap();
    let b = heap.allocate(13).unwrap();
    let c = heap.allocate(256).unwrap();
    println!("a = {a:?}, b = {b:?}, c = {c:?}");

    println!("{}", heap.dump());

    heap.free(b.as_ptr()).unwrap();
    heap.free(a.as_ptr()).unwrap();
    println!("{}", heap.summary());

    // The run a + b was merged, so the same address comes back.
    let d = heap.allocate(64).unwrap();
    println!("d = {d:?} (a was {a:?})");

    // Already free, reported but harmless.
    println!("free(b) again: {:?}", heap.free(b.as_ptr()));

    heap.free(c.as_ptr()).unwrap();
    heap.free(d.as_ptr()).unwrap();
    println!("{}", heap.dump());
}
