//! Compares `free` and `free_secure`: after a plain free the old contents
//! are still in the arena, after a secure free they are gone.

use chainalloc::Heap;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chainalloc=info".parse().unwrap()),
        )
        .init();

    let mut heap = Heap::new();
    let msg = b"Hello world\n";

    let str = heap.allocate(msg.len() as isize).unwrap().as_ptr();
    unsafe { std::ptr::copy_nonoverlapping(msg.as_ptr(), str, msg.len()) };
    println!("'str': {:?}", String::from_utf8_lossy(heap.bytes(str, msg.len()).unwrap()));

    heap.free(str).unwrap();
    println!(
        "After free: {:?}",
        String::from_utf8_lossy(heap.bytes(str, msg.len()).unwrap())
    );

    let str = heap.allocate(msg.len() as isize).unwrap().as_ptr();
    heap.free_secure(str).unwrap();
    println!("After free_secure: {:?}", heap.bytes(str, msg.len()).unwrap());
}
