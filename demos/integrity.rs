//! Shows the header sentinel at work. The first string fits its block, the
//! second one is written past the end of its block, over the next header,
//! and freeing it faults.

use chainalloc::Heap;

fn write_str(ptr: *mut u8, s: &str) {
    unsafe { std::ptr::copy_nonoverlapping(s.as_ptr(), ptr, s.len()) };
}

fn read_str(heap: &Heap, ptr: *mut u8, len: usize) -> String {
    String::from_utf8_lossy(heap.bytes(ptr, len).unwrap()).into_owned()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chainalloc=info".parse().unwrap()),
        )
        .init();

    let mut heap = Heap::new();

    // Using the allocated space properly.
    let hello = "hello, world!\n";
    let str = heap.allocate(hello.len() as isize).unwrap().as_ptr();
    write_str(str, hello);
    print!("{}", read_str(&heap, str, hello.len()));
    heap.free(str).unwrap();

    // Now writing more than what was allocated.
    let str = heap.allocate(hello.len() as isize).unwrap().as_ptr();
    let cruel = "hello, cruel world!\n";
    write_str(str, cruel);
    print!("{}", read_str(&heap, str, cruel.len()));

    if let Err(err) = heap.check() {
        println!("check: {err}");
    }

    // Faults here.
    let _ = heap.free(str);
}
